//! Popularity rankings computed from raw interaction records.

use super::error::{RecommendationError, RecommendationResult};
use super::models::{Interaction, PopularityAlgorithm, SongId};
use std::collections::BTreeMap;
use tracing::info;

/// Per song aggregates over the interaction records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongAggregate {
    /// Number of interaction records.
    pub count: u64,
    pub total_plays: u64,
    pub mean_plays: f64,
}

#[derive(Debug, Clone)]
pub struct PopularityRanker {
    aggregates: BTreeMap<SongId, SongAggregate>,
    prior_count: f64,
    prior_mean: f64,
    bayesian: Vec<(SongId, f64)>,
    frequency: Vec<(SongId, f64)>,
}

impl PopularityRanker {
    /// `confidence_weight` overrides the prior count, which otherwise is the
    /// mean number of records per song.
    pub fn build(
        interactions: &[Interaction],
        confidence_weight: Option<f64>,
    ) -> RecommendationResult<Self> {
        let mut totals: BTreeMap<SongId, (u64, u64)> = BTreeMap::new();
        for interaction in interactions {
            let entry = totals.entry(interaction.song_id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += interaction.plays;
        }
        if totals.is_empty() {
            return Err(RecommendationError::DataError(
                "No interaction records to rank".to_string(),
            ));
        }

        let aggregates: BTreeMap<SongId, SongAggregate> = totals
            .into_iter()
            .map(|(song_id, (count, total_plays))| {
                (
                    song_id,
                    SongAggregate {
                        count,
                        total_plays,
                        mean_plays: total_plays as f64 / count as f64,
                    },
                )
            })
            .collect();

        let songs = aggregates.len() as f64;
        let mean_count = aggregates.values().map(|a| a.count as f64).sum::<f64>() / songs;
        let prior_count = confidence_weight.unwrap_or(mean_count);
        let prior_mean = aggregates.values().map(|a| a.mean_plays).sum::<f64>() / songs;

        let bayesian = rank(aggregates.iter().map(|(&song_id, a)| {
            let n = a.count as f64;
            let score = (prior_count * prior_mean + n * a.mean_plays) / (prior_count + n);
            (song_id, score)
        }));
        let frequency = rank(
            aggregates
                .iter()
                .map(|(&song_id, a)| (song_id, a.total_plays as f64)),
        );

        info!(
            "Popularity rankings built for {} songs (prior count {:.2}, prior mean {:.2})",
            aggregates.len(),
            prior_count,
            prior_mean
        );

        Ok(Self {
            aggregates,
            prior_count,
            prior_mean,
            bayesian,
            frequency,
        })
    }

    pub fn aggregate(&self, song_id: SongId) -> Option<&SongAggregate> {
        self.aggregates.get(&song_id)
    }

    pub fn prior(&self) -> (f64, f64) {
        (self.prior_count, self.prior_mean)
    }

    /// The best `limit` songs, fewer when less songs are known.
    pub fn top(&self, algorithm: PopularityAlgorithm, limit: usize) -> &[(SongId, f64)] {
        let ranking = match algorithm {
            PopularityAlgorithm::Bayesian => &self.bayesian,
            PopularityAlgorithm::Frequency => &self.frequency,
        };
        &ranking[..limit.min(ranking.len())]
    }
}

fn rank(scores: impl Iterator<Item = (SongId, f64)>) -> Vec<(SongId, f64)> {
    let mut ranked: Vec<(SongId, f64)> = scores.collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}
