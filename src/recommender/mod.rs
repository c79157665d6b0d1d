//! In-memory recommendation engine.
//!
//! Collaborative filtering runs a nearest neighbor search over song factors
//! obtained from the user x song play matrix, content based filtering compares
//! one-hot genre vectors, and popularity ranks songs by a Bayesian average or
//! by raw play counts.

mod content_index;
mod engine;
mod error;
mod fuzzy;
mod id_mapper;
mod interaction_matrix;
mod models;
mod neighbors;
mod popularity;
mod reducer;
mod snapshot;

pub use content_index::{ContentIndex, ContentRow};
pub use engine::{EngineSettings, QueryLimits, RecommendationEngine};
pub use error::{RecommendationError, RecommendationResult};
pub use fuzzy::{best_match, title_score};
pub use id_mapper::{IdMapper, SongIndex, UserIndex};
pub use interaction_matrix::InteractionMatrix;
pub use models::*;
pub use neighbors::{k_nearest, Neighbor};
pub use popularity::{PopularityRanker, SongAggregate};
pub use reducer::{truncated_svd, ReducerSettings, SongFactors};
pub use snapshot::EngineSnapshot;
