//! The recommendation engine: owns the published snapshot, rebuilds it from
//! the data provider and answers queries against it.

use super::error::{RecommendationError, RecommendationResult};
use super::models::{
    ContentRecommendations, DistanceMetric, EngineState, EngineStatus, PopularityAlgorithm, SongDetails,
    SongId, SongInfo, SystemStats, UserPlay,
};
use super::neighbors;
use super::reducer::ReducerSettings;
use super::snapshot::EngineSnapshot;
use crate::data_provider::SongDataProvider;
use crate::metrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Bounds applied to caller supplied counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_k_neighbors: usize,
    pub max_k_neighbors: usize,
    pub default_recommendations: usize,
    pub max_recommendations: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_k_neighbors: 10,
            max_k_neighbors: 50,
            default_recommendations: 10,
            max_recommendations: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub reducer: ReducerSettings,
    /// Prior count of the Bayesian average, the mean count per song if unset.
    pub bayesian_confidence_weight: Option<f64>,
    pub limits: QueryLimits,
}

pub struct RecommendationEngine {
    provider: Arc<dyn SongDataProvider>,
    settings: EngineSettings,
    snapshot: RwLock<Option<Arc<EngineSnapshot>>>,
    /// Serializes (re)initializations.
    rebuild_lock: Mutex<()>,
    initializing: AtomicBool,
}

impl RecommendationEngine {
    pub fn new(provider: Arc<dyn SongDataProvider>, settings: EngineSettings) -> Self {
        Self {
            provider,
            settings,
            snapshot: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
            initializing: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn provider(&self) -> &Arc<dyn SongDataProvider> {
        &self.provider
    }

    /// Loads all data and builds a new snapshot, replacing the published one
    /// only when every step succeeded.
    pub async fn initialize(&self) -> RecommendationResult<EngineStatus> {
        let _guard = self.rebuild_lock.lock().await;
        let _initializing = InitializingFlag::raise(&self.initializing);
        info!("Initializing recommendation engine...");

        let start = Instant::now();
        let result = self.build_snapshot().await;
        metrics::record_engine_initialization(result.is_ok(), start.elapsed());

        let outcome = match result {
            Ok(snapshot) => {
                metrics::set_engine_snapshot(
                    snapshot.stats.total_songs,
                    snapshot.stats.total_users,
                    snapshot.stats.total_genres,
                    snapshot.is_degraded(),
                );
                self.publish(Arc::new(snapshot));
                info!(
                    "Recommendation engine initialized in {:?}",
                    start.elapsed()
                );
                Ok(())
            }
            Err(err) => {
                error!("Failed to initialize recommendation engine: {}", err);
                Err(err)
            }
        };

        drop(_initializing);
        outcome.map(|_| self.status())
    }

    async fn build_snapshot(&self) -> RecommendationResult<EngineSnapshot> {
        let (interactions, catalog) = tokio::try_join!(
            self.provider.fetch_interactions(),
            self.provider.fetch_song_catalog()
        )
        .map_err(RecommendationError::upstream)?;
        info!(
            "Loaded {} interaction records and {} catalog songs",
            interactions.len(),
            catalog.len()
        );

        let reducer = self.settings.reducer.clone();
        let confidence_weight = self.settings.bayesian_confidence_weight;
        tokio::task::spawn_blocking(move || {
            EngineSnapshot::build(&interactions, catalog, &reducer, confidence_weight)
        })
        .await
        .map_err(|e| RecommendationError::Internal(format!("engine build task failed: {}", e)))?
    }

    fn publish(&self, snapshot: Arc<EngineSnapshot>) {
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(snapshot);
    }

    fn current(&self) -> Option<Arc<EngineSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn ready_snapshot(&self) -> RecommendationResult<Arc<EngineSnapshot>> {
        self.current().ok_or(RecommendationError::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    pub fn status(&self) -> EngineStatus {
        let snapshot = self.current();
        let initializing = self.initializing.load(Ordering::SeqCst);
        let state = match &snapshot {
            None if initializing => EngineState::Initializing,
            None => EngineState::Uninitialized,
            Some(s) if s.is_degraded() => EngineState::DegradedReady,
            Some(_) => EngineState::Ready,
        };
        let algorithms_available = if snapshot.is_some() {
            [
                "collaborative_filtering",
                "content_based",
                "popularity_bayesian",
                "popularity_frequency",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect()
        } else {
            Vec::new()
        };

        EngineStatus {
            state,
            is_initialized: snapshot.is_some(),
            refreshing: initializing && snapshot.is_some(),
            algorithms_available,
            factorization: snapshot
                .as_ref()
                .map(|s| String::from(if s.is_degraded() { "raw" } else { "svd" })),
            data_last_updated: snapshot.as_ref().map(|s| s.built_at),
        }
    }

    pub async fn find_similar_songs(
        &self,
        song_id: SongId,
        k: Option<usize>,
        metric: DistanceMetric,
    ) -> RecommendationResult<Vec<SongInfo>> {
        let start = Instant::now();
        let result = self.similar_songs(song_id, k, metric).await;
        metrics::record_query("similar_songs", result.is_ok(), start.elapsed());
        result
    }

    async fn similar_songs(
        &self,
        song_id: SongId,
        k: Option<usize>,
        metric: DistanceMetric,
    ) -> RecommendationResult<Vec<SongInfo>> {
        let snapshot = self.ready_snapshot()?;
        let limits = &self.settings.limits;
        let k = check_count("k", k, limits.default_k_neighbors, limits.max_k_neighbors)?;

        let index = snapshot.matrix.songs().index_of(&song_id).map_err(|_| {
            RecommendationError::NotFound(format!(
                "Song ID {} not found in the interaction data",
                song_id
            ))
        })?;

        let search_snapshot = snapshot.clone();
        let neighbors = tokio::task::spawn_blocking(move || {
            neighbors::k_nearest(search_snapshot.factors.matrix(), index, k, metric)
        })
        .await
        .map_err(|e| RecommendationError::Internal(format!("neighbor search failed: {}", e)))??;

        let mut songs = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let Some(&neighbor_id) = snapshot.matrix.songs().key_of(neighbor.index) else {
                continue;
            };
            if let Some(details) = self.resolve_song(neighbor_id, "similar_songs").await {
                songs.push(SongInfo::from_details(
                    details,
                    Some(neighbor.similarity(metric)),
                ));
            }
        }

        debug!(
            "Found {} songs similar to {} ({})",
            songs.len(),
            song_id,
            metric.as_str()
        );
        Ok(songs)
    }

    pub async fn get_content_based_recommendations(
        &self,
        title: &str,
        n: Option<usize>,
    ) -> RecommendationResult<ContentRecommendations> {
        let start = Instant::now();
        let result = self.content_based(title, n);
        metrics::record_query("content_based", result.is_ok(), start.elapsed());
        result
    }

    fn content_based(
        &self,
        title: &str,
        n: Option<usize>,
    ) -> RecommendationResult<ContentRecommendations> {
        let snapshot = self.ready_snapshot()?;
        let limits = &self.settings.limits;
        if title.trim().is_empty() {
            return Err(RecommendationError::InvalidArgument(
                "song title must not be empty".to_string(),
            ));
        }
        let n = check_count(
            "n_recommendations",
            n,
            limits.default_recommendations,
            limits.max_k_neighbors,
        )?;

        let (row, matched_title) = snapshot.content.match_title(title)?;
        let songs = snapshot.content.recommend(row, n);
        debug!(
            "Content based recommendations for '{}' matched '{}': {} songs",
            title,
            matched_title,
            songs.len()
        );

        Ok(ContentRecommendations {
            matched_title: matched_title.to_string(),
            songs,
        })
    }

    pub async fn get_popular_songs(
        &self,
        limit: Option<usize>,
        algorithm: PopularityAlgorithm,
    ) -> RecommendationResult<Vec<SongInfo>> {
        let start = Instant::now();
        let result = self.popular_songs(limit, algorithm).await;
        metrics::record_query("popular", result.is_ok(), start.elapsed());
        result
    }

    async fn popular_songs(
        &self,
        limit: Option<usize>,
        algorithm: PopularityAlgorithm,
    ) -> RecommendationResult<Vec<SongInfo>> {
        let snapshot = self.ready_snapshot()?;
        let limits = &self.settings.limits;
        let limit = check_count(
            "limit",
            limit,
            limits.default_recommendations,
            limits.max_recommendations,
        )?;

        let mut songs = Vec::with_capacity(limit);
        for &(song_id, score) in snapshot.popularity.top(algorithm, limit) {
            if let Some(details) = self.resolve_song(song_id, "popular").await {
                songs.push(SongInfo::from_details(details, Some(score)));
            }
        }
        Ok(songs)
    }

    /// Statistics of the published snapshot, or plain counts from the data
    /// provider when nothing is published yet.
    pub async fn get_system_stats(&self) -> RecommendationResult<SystemStats> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot.stats.clone());
        }
        let counts = self
            .provider
            .fetch_count_stats()
            .await
            .map_err(RecommendationError::upstream)?;
        Ok(counts.into())
    }

    pub async fn get_song_details(&self, song_id: SongId) -> RecommendationResult<SongDetails> {
        self.provider
            .fetch_song_by_id(song_id)
            .await
            .map_err(RecommendationError::upstream)?
            .ok_or_else(|| RecommendationError::NotFound(format!("Song {} not found", song_id)))
    }

    pub async fn search_songs(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> RecommendationResult<Vec<SongInfo>> {
        if query.trim().is_empty() {
            return Err(RecommendationError::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }
        let limits = &self.settings.limits;
        let limit = check_count(
            "limit",
            limit,
            limits.default_recommendations,
            limits.max_recommendations,
        )?;

        let found = self
            .provider
            .search_songs_by_title(query.trim(), limit)
            .await
            .map_err(RecommendationError::upstream)?;
        Ok(found
            .into_iter()
            .map(|details| SongInfo::from_details(details, None))
            .collect())
    }

    pub async fn user_history(&self, user_id: &str) -> RecommendationResult<Vec<UserPlay>> {
        let history = self
            .provider
            .fetch_user_play_history(user_id)
            .await
            .map_err(RecommendationError::upstream)?;
        if history.is_empty() {
            return Err(RecommendationError::NotFound(format!(
                "No play history for user {}",
                user_id
            )));
        }
        Ok(history)
    }

    /// Details of a ranked song. Songs that vanished from the catalog, or
    /// whose lookup failed, are dropped from the result.
    async fn resolve_song(&self, song_id: SongId, operation: &str) -> Option<SongDetails> {
        match self.provider.fetch_song_by_id(song_id).await {
            Ok(Some(details)) => Some(details),
            Ok(None) => {
                warn!("Skipping song {}: no longer available", song_id);
                metrics::record_skipped_song(operation);
                None
            }
            Err(err) => {
                warn!("Skipping song {}: lookup failed: {:#}", song_id, err);
                metrics::record_skipped_song(operation);
                None
            }
        }
    }
}

/// Keeps the initializing flag up until dropped, also when the rebuild
/// future is cancelled.
struct InitializingFlag<'a>(&'a AtomicBool);

impl<'a> InitializingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InitializingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn check_count(
    name: &str,
    value: Option<usize>,
    default: usize,
    max: usize,
) -> RecommendationResult<usize> {
    let value = value.unwrap_or(default);
    if value == 0 || value > max {
        return Err(RecommendationError::InvalidArgument(format!(
            "{} must be between 1 and {}, got {}",
            name, max, value
        )));
    }
    Ok(value)
}
