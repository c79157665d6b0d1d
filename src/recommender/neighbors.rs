//! Brute-force nearest neighbor search over the song factor rows.

use super::error::{RecommendationError, RecommendationResult};
use super::id_mapper::SongIndex;
use super::models::DistanceMetric;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: SongIndex,
    pub distance: f64,
}

impl Neighbor {
    pub fn similarity(&self, metric: DistanceMetric) -> f64 {
        metric.similarity(self.distance)
    }
}

pub fn distance(metric: DistanceMetric, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    match metric {
        DistanceMetric::Cosine => {
            let norms = a.dot(&a).sqrt() * b.dot(&b).sqrt();
            if norms == 0.0 {
                // A zero vector has no direction, treat it as orthogonal.
                1.0
            } else {
                // Rounding can push parallel rows slightly below zero.
                (1.0 - a.dot(&b) / norms).clamp(0.0, 2.0)
            }
        }
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt(),
    }
}

/// The `k` rows closest to `query`, excluding `query` itself. Ordered by
/// ascending distance, then ascending index.
pub fn k_nearest(
    factors: &Array2<f64>,
    query: SongIndex,
    k: usize,
    metric: DistanceMetric,
) -> RecommendationResult<Vec<Neighbor>> {
    if query.0 >= factors.nrows() {
        return Err(RecommendationError::NotFound(format!(
            "Song index {} outside of a factor space of {} rows",
            query.0,
            factors.nrows()
        )));
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let query_row = factors.row(query.0);
    let mut neighbors: Vec<Neighbor> = (0..factors.nrows())
        .into_par_iter()
        .filter(|&row| row != query.0)
        .map(|row| Neighbor {
            index: SongIndex(row),
            distance: distance(metric, query_row, factors.row(row)),
        })
        .collect();

    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.index.cmp(&b.index))
    });
    neighbors.truncate(k);
    Ok(neighbors)
}
