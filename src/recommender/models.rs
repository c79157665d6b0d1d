//! Value types shared by the engine, the data provider and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog identifier of a song.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub i64);

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a listener.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_owned())
    }
}

/// One observed (user, song, play count) fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user_id: UserId,
    pub song_id: SongId,
    pub plays: u64,
}

impl Interaction {
    pub fn new(user_id: impl Into<String>, song_id: i64, plays: u64) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            song_id: SongId(song_id),
            plays,
        }
    }
}

/// A row of the song catalog table used to build the content index.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSong {
    pub song_id: SongId,
    pub title: String,
    pub genre: String,
    pub artist: Option<String>,
}

/// Full song details as returned by a per-song lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDetails {
    pub song_id: SongId,
    pub title: String,
    pub genre: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<f64>,
    pub path: Option<String>,
    pub created_at: Option<String>,
}

/// A song as returned by every recommendation operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongInfo {
    pub song_id: SongId,
    pub title: String,
    pub genre: Option<String>,
    pub artist: Option<String>,
    pub similarity_score: Option<f64>,
}

impl SongInfo {
    pub fn from_details(details: SongDetails, similarity_score: Option<f64>) -> Self {
        Self {
            song_id: details.song_id,
            title: details.title,
            genre: details.genre,
            artist: details.artist,
            similarity_score,
        }
    }
}

/// A single entry of a user's listening history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPlay {
    pub user_id: UserId,
    pub song_id: SongId,
    pub plays: u64,
    pub title: String,
    pub genre: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "euclidean" => Some(DistanceMetric::Euclidean),
            _ => None,
        }
    }

    /// Turns a neighbor distance into a similarity score.
    pub fn similarity(&self, distance: f64) -> f64 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopularityAlgorithm {
    #[default]
    Bayesian,
    Frequency,
}

impl PopularityAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PopularityAlgorithm::Bayesian => "bayesian",
            PopularityAlgorithm::Frequency => "frequency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bayesian" => Some(PopularityAlgorithm::Bayesian),
            "frequency" => Some(PopularityAlgorithm::Frequency),
            _ => None,
        }
    }
}

/// Lightweight counts the data provider can compute without the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountStats {
    pub song_count: usize,
    pub user_count: usize,
    pub total_plays: u64,
    pub genre_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_songs: usize,
    pub total_users: usize,
    pub total_plays: u64,
    pub total_genres: usize,
    /// Percentage of filled user/song cells.
    pub sparsity: Option<f64>,
    pub avg_plays_per_user: Option<f64>,
    pub avg_plays_per_song: Option<f64>,
    pub matrix_shape: Option<(usize, usize)>,
}

impl From<CountStats> for SystemStats {
    fn from(counts: CountStats) -> Self {
        Self {
            total_songs: counts.song_count,
            total_users: counts.user_count,
            total_plays: counts.total_plays,
            total_genres: counts.genre_count,
            sparsity: None,
            avg_plays_per_user: None,
            avg_plays_per_song: None,
            matrix_shape: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecommendations {
    pub matched_title: String,
    pub songs: Vec<SongInfo>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    /// Ready, but the factorization fell back to the raw interaction matrix.
    DegradedReady,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub is_initialized: bool,
    /// True while a rebuild is running on top of an already published snapshot.
    pub refreshing: bool,
    pub algorithms_available: Vec<String>,
    /// "svd" or "raw", depending on the factor space neighbor search uses.
    pub factorization: Option<String>,
    pub data_last_updated: Option<DateTime<Utc>>,
}
