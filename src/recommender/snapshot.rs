use super::content_index::ContentIndex;
use super::error::RecommendationResult;
use super::interaction_matrix::InteractionMatrix;
use super::models::{CatalogSong, Interaction, SystemStats};
use super::popularity::PopularityRanker;
use super::reducer::{ReducerSettings, SongFactors};
use chrono::{DateTime, Utc};

/// Every structure the engine queries, built together and never mutated
/// after construction.
pub struct EngineSnapshot {
    pub matrix: InteractionMatrix,
    pub factors: SongFactors,
    pub content: ContentIndex,
    pub popularity: PopularityRanker,
    pub stats: SystemStats,
    pub built_at: DateTime<Utc>,
}

impl EngineSnapshot {
    pub fn build(
        interactions: &[Interaction],
        catalog: Vec<CatalogSong>,
        reducer: &ReducerSettings,
        confidence_weight: Option<f64>,
    ) -> RecommendationResult<Self> {
        let matrix = InteractionMatrix::build(interactions)?;
        let content = ContentIndex::build(catalog)?;
        let popularity = PopularityRanker::build(interactions, confidence_weight)?;
        let factors = SongFactors::build(&matrix, reducer);
        let stats = compute_stats(interactions, &matrix, &content);

        Ok(Self {
            matrix,
            factors,
            content,
            popularity,
            stats,
            built_at: Utc::now(),
        })
    }

    pub fn is_degraded(&self) -> bool {
        !self.factors.is_reduced()
    }
}

fn compute_stats(
    interactions: &[Interaction],
    matrix: &InteractionMatrix,
    content: &ContentIndex,
) -> SystemStats {
    let (n_users, n_songs) = matrix.shape();
    let cells = (n_users * n_songs) as f64;
    let sparsity = matrix.nnz() as f64 / cells * 100.0;

    SystemStats {
        total_songs: content.len(),
        total_users: n_users,
        total_plays: interactions.iter().map(|i| i.plays).sum(),
        total_genres: content.genres().len(),
        sparsity: Some(round_to(sparsity, 4)),
        avg_plays_per_user: Some(round_to(mean(&matrix.plays_per_user()), 2)),
        avg_plays_per_song: Some(round_to(mean(&matrix.plays_per_song()), 2)),
        matrix_shape: Some((n_users, n_songs)),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
