//! MW Music Recommender Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod data_provider;
pub mod metrics;
pub mod recommender;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use data_provider::{SongDataProvider, SqliteDataProvider};
pub use recommender::{EngineSettings, RecommendationEngine};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
