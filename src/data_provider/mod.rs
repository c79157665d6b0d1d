mod schema;
mod sqlite_provider;

pub use schema::RECOMMENDER_VERSIONED_SCHEMAS;
pub use sqlite_provider::SqliteDataProvider;

use crate::recommender::{CatalogSong, CountStats, Interaction, SongDetails, SongId, UserPlay};
use anyhow::Result;
use async_trait::async_trait;

/// Read-only source of the data the recommendation engine is built from.
///
/// Implementations must not block the calling task.
#[async_trait]
pub trait SongDataProvider: Send + Sync {
    /// Every (user, song, plays) record of available songs.
    async fn fetch_interactions(&self) -> Result<Vec<Interaction>>;

    /// Available songs with their genre, in table order.
    async fn fetch_song_catalog(&self) -> Result<Vec<CatalogSong>>;

    /// Details of a single song, `None` if it is missing or not available.
    async fn fetch_song_by_id(&self, song_id: SongId) -> Result<Option<SongDetails>>;

    async fn fetch_count_stats(&self) -> Result<CountStats>;

    /// Songs whose title contains `query`, case insensitive.
    async fn search_songs_by_title(&self, query: &str, limit: usize) -> Result<Vec<SongDetails>>;

    /// Plays of a user, most played first.
    async fn fetch_user_play_history(&self, user_id: &str) -> Result<Vec<UserPlay>>;

    async fn health_check(&self) -> Result<()>;
}
