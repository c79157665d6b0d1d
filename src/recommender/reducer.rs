//! Truncated SVD of the songs x users matrix.
//!
//! The factorization follows the randomized range finder scheme: a seeded
//! Gaussian sketch of the column space is refined with a fixed number of
//! power iterations, the matrix is projected on the resulting orthonormal
//! basis and the small projected matrix is decomposed exactly with Jacobi
//! rotations. The output is `U·Σ` restricted to the requested rank, one row
//! per song.
//!
//! Any numerical problem is reported as [`RecommendationError::ComputationFailure`]
//! and [`SongFactors::build`] turns it into the raw fallback space.

use super::error::{RecommendationError, RecommendationResult};
use super::interaction_matrix::InteractionMatrix;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{info, warn};

const MAX_JACOBI_SWEEPS: usize = 64;
const JACOBI_TOLERANCE: f64 = 1e-24;
const COLLAPSED_COLUMN_NORM: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct ReducerSettings {
    pub rank: usize,
    pub iterations: usize,
    pub seed: u64,
    pub oversamples: usize,
}

impl Default for ReducerSettings {
    fn default() -> Self {
        Self {
            rank: 20,
            iterations: 10,
            seed: 42,
            oversamples: 10,
        }
    }
}

/// The space neighbor search runs in, one row per [`super::id_mapper::SongIndex`].
#[derive(Debug, Clone)]
pub enum SongFactors {
    Reduced(Array2<f64>),
    /// Dense songs x users play counts, used when the factorization failed.
    Raw(Array2<f64>),
}

impl SongFactors {
    pub fn build(matrix: &InteractionMatrix, settings: &ReducerSettings) -> Self {
        match truncated_svd(matrix, settings) {
            Ok(reduced) => {
                info!("Matrix factorization initialized: {:?}", reduced.dim());
                SongFactors::Reduced(reduced)
            }
            Err(err) => {
                warn!(
                    "Matrix factorization initialization failed, using the raw matrix: {}",
                    err
                );
                SongFactors::Raw(matrix.song_user_dense())
            }
        }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        match self {
            SongFactors::Reduced(m) | SongFactors::Raw(m) => m,
        }
    }

    pub fn is_reduced(&self) -> bool {
        matches!(self, SongFactors::Reduced(_))
    }
}

pub fn truncated_svd(
    matrix: &InteractionMatrix,
    settings: &ReducerSettings,
) -> RecommendationResult<Array2<f64>> {
    let (n_users, n_songs) = matrix.shape();
    let rank = settings.rank;

    if rank == 0 {
        return Err(RecommendationError::ComputationFailure(
            "rank must be at least 1".to_string(),
        ));
    }
    if rank > n_users || rank > n_songs {
        return Err(RecommendationError::ComputationFailure(format!(
            "rank {} exceeds the dimensions of a {}x{} matrix",
            rank, n_songs, n_users
        )));
    }

    let sketch_size = (rank + settings.oversamples).min(n_users).min(n_songs);
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let omega: Array2<f64> = Array2::from_shape_fn((n_users, sketch_size), |_| {
        StandardNormal.sample(&mut rng)
    });

    // X = Aᵀ (songs x users), so X·M = A.transpose_mul(M) and Xᵀ·M = A.mul(M).
    let mut q = orthonormalize(matrix.transpose_mul(&omega));
    for _ in 0..settings.iterations {
        let z = orthonormalize(matrix.mul(&q));
        q = orthonormalize(matrix.transpose_mul(&z));
    }

    // B = Qᵀ·X, and B·Bᵀ = (Xᵀ·Q)ᵀ·(Xᵀ·Q).
    let xt_q = matrix.mul(&q);
    let gram = xt_q.t().dot(&xt_q);
    let (eigenvalues, eigenvectors) = symmetric_eigen(gram)?;

    let top_vectors = eigenvectors.slice(ndarray::s![.., ..rank]).to_owned();
    let singular_values: Array1<f64> = eigenvalues
        .iter()
        .take(rank)
        .map(|&l| l.max(0.0).sqrt())
        .collect();

    let mut reduced = q.dot(&top_vectors);
    for (mut column, sigma) in reduced.axis_iter_mut(Axis(1)).zip(singular_values.iter()) {
        column.mapv_inplace(|v| v * sigma);
    }

    if reduced.iter().any(|v| !v.is_finite()) {
        return Err(RecommendationError::ComputationFailure(
            "factorization produced non-finite values".to_string(),
        ));
    }

    flip_signs(&mut reduced);
    Ok(reduced)
}

/// Modified Gram-Schmidt over the columns. Columns that collapse to zero are
/// left as zero vectors.
fn orthonormalize(mut m: Array2<f64>) -> Array2<f64> {
    let cols = m.ncols();
    for j in 0..cols {
        for i in 0..j {
            let projection = m.column(i).dot(&m.column(j));
            let previous = m.column(i).to_owned();
            m.column_mut(j).scaled_add(-projection, &previous);
        }
        let norm = m.column(j).dot(&m.column(j)).sqrt();
        if norm > COLLAPSED_COLUMN_NORM {
            m.column_mut(j).mapv_inplace(|v| v / norm);
        } else {
            m.column_mut(j).fill(0.0);
        }
    }
    m
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix. Eigenvalues are
/// returned in descending order with matching eigenvector columns.
fn symmetric_eigen(mut a: Array2<f64>) -> RecommendationResult<(Vec<f64>, Array2<f64>)> {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    let mut converged = false;
    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off_diagonal = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diagonal <= JACOBI_TOLERANCE * scale {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    if !converged {
        return Err(RecommendationError::ComputationFailure(format!(
            "eigen-decomposition did not converge after {} sweeps",
            MAX_JACOBI_SWEEPS
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = order.iter().map(|&i| a[[i, i]]).collect();
    let eigenvectors = Array2::from_shape_fn((n, n), |(row, col)| v[[row, order[col]]]);
    Ok((eigenvalues, eigenvectors))
}

/// Makes the largest-magnitude entry of every column positive so repeated
/// runs agree on the orientation of each component.
fn flip_signs(m: &mut Array2<f64>) {
    for mut column in m.axis_iter_mut(Axis(1)) {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            column.mapv_inplace(|v| -v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommender::models::Interaction;
    use ndarray::array;

    fn wide_matrix() -> InteractionMatrix {
        let mut interactions = Vec::new();
        for user in 0..6 {
            for song in 1..=4 {
                let plays = ((user * 7 + song * 3) % 5) as u64;
                if plays > 0 {
                    interactions.push(Interaction::new(format!("u{}", user), song, plays));
                }
            }
        }
        InteractionMatrix::build(&interactions).unwrap()
    }

    fn settings(rank: usize) -> ReducerSettings {
        ReducerSettings {
            rank,
            ..Default::default()
        }
    }

    #[test]
    fn full_rank_factors_preserve_song_gram_matrix() {
        let matrix = wide_matrix();
        let (_, n_songs) = matrix.shape();
        let reduced = truncated_svd(&matrix, &settings(n_songs)).unwrap();

        let x = matrix.song_user_dense();
        let expected = x.dot(&x.t());
        let actual = reduced.dot(&reduced.t());

        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6, "{} != {}", a, e);
        }
    }

    #[test]
    fn factorization_is_deterministic() {
        let matrix = wide_matrix();
        let first = truncated_svd(&matrix, &settings(2)).unwrap();
        let second = truncated_svd(&matrix, &settings(2)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.dim(), (4, 2));
    }

    #[test]
    fn rank_larger_than_matrix_fails() {
        let matrix = wide_matrix();
        assert!(matches!(
            truncated_svd(&matrix, &settings(20)),
            Err(RecommendationError::ComputationFailure(_))
        ));
        assert!(matches!(
            truncated_svd(&matrix, &settings(0)),
            Err(RecommendationError::ComputationFailure(_))
        ));
    }

    #[test]
    fn falls_back_to_raw_matrix() {
        let matrix = wide_matrix();
        let factors = SongFactors::build(&matrix, &settings(20));
        assert!(!factors.is_reduced());
        assert_eq!(factors.matrix(), &matrix.song_user_dense());

        let factors = SongFactors::build(&matrix, &settings(2));
        assert!(factors.is_reduced());
        assert_eq!(factors.matrix().dim(), (4, 2));
    }

    #[test]
    fn jacobi_recovers_known_eigenvalues() {
        let (values, vectors) = symmetric_eigen(array![[2.0, 1.0], [1.0, 2.0]]).unwrap();
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        let first = vectors.column(0);
        assert!((first[0].abs() - first[1].abs()).abs() < 1e-12);
    }

    #[test]
    fn orthonormalize_zeroes_dependent_columns() {
        let q = orthonormalize(array![[1.0, 2.0], [1.0, 2.0]]);
        assert!((q.column(0).dot(&q.column(0)) - 1.0).abs() < 1e-12);
        assert!(q.column(1).iter().all(|v| v.abs() < 1e-9));
    }
}
