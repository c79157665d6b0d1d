//! Sparse users x songs play-count matrix.

use super::error::{RecommendationError, RecommendationResult};
use super::id_mapper::{IdMapper, SongIndex, UserIndex};
use super::models::{Interaction, SongId, UserId};
use ndarray::Array2;
use sprs::{CsMat, TriMat};
use tracing::info;

pub type UserMapper = IdMapper<UserId, UserIndex>;
pub type SongMapper = IdMapper<SongId, SongIndex>;

pub struct InteractionMatrix {
    users: UserMapper,
    songs: SongMapper,
    /// CSR, one row per user.
    matrix: CsMat<f64>,
}

impl InteractionMatrix {
    /// Builds the matrix from raw interaction records. Duplicate (user, song)
    /// pairs are summed.
    pub fn build(interactions: &[Interaction]) -> RecommendationResult<Self> {
        let users: UserMapper = IdMapper::build(interactions.iter().map(|i| &i.user_id));
        let songs: SongMapper = IdMapper::build(interactions.iter().map(|i| &i.song_id));

        if users.is_empty() || songs.is_empty() {
            return Err(RecommendationError::DataError(
                "No interaction records to build the user-item matrix from".to_string(),
            ));
        }

        let mut triplets = TriMat::new((users.len(), songs.len()));
        for interaction in interactions {
            let row = users.index_of(&interaction.user_id)?;
            let col = songs.index_of(&interaction.song_id)?;
            triplets.add_triplet(row.0, col.0, interaction.plays as f64);
        }
        // Conversion to CSR sums entries sharing a position.
        let matrix: CsMat<f64> = triplets.to_csr();

        info!(
            "Created user-item matrix: ({}, {}) with {} non-zero cells",
            matrix.rows(),
            matrix.cols(),
            matrix.nnz()
        );

        Ok(Self {
            users,
            songs,
            matrix,
        })
    }

    pub fn users(&self) -> &UserMapper {
        &self.users
    }

    pub fn songs(&self) -> &SongMapper {
        &self.songs
    }

    /// (users, songs)
    pub fn shape(&self) -> (usize, usize) {
        (self.matrix.rows(), self.matrix.cols())
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    pub fn get(&self, user: UserIndex, song: SongIndex) -> f64 {
        self.matrix.get(user.0, song.0).copied().unwrap_or(0.0)
    }

    /// Dense songs x users matrix, the raw factor space.
    pub fn song_user_dense(&self) -> Array2<f64> {
        let (n_users, n_songs) = self.shape();
        let mut dense = Array2::<f64>::zeros((n_songs, n_users));
        for (user, row) in self.matrix.outer_iterator().enumerate() {
            for (song, &plays) in row.iter() {
                dense[[song, user]] = plays;
            }
        }
        dense
    }

    /// Computes `Aᵀ · rhs` where `A` is this users x songs matrix and `rhs` has
    /// one row per user. The result has one row per song.
    pub fn transpose_mul(&self, rhs: &Array2<f64>) -> Array2<f64> {
        let (n_users, n_songs) = self.shape();
        debug_assert_eq!(rhs.nrows(), n_users);
        let mut out = Array2::<f64>::zeros((n_songs, rhs.ncols()));
        for (user, row) in self.matrix.outer_iterator().enumerate() {
            let user_row = rhs.row(user);
            for (song, &plays) in row.iter() {
                out.row_mut(song).scaled_add(plays, &user_row);
            }
        }
        out
    }

    /// Computes `A · rhs` where `rhs` has one row per song. The result has one
    /// row per user.
    pub fn mul(&self, rhs: &Array2<f64>) -> Array2<f64> {
        let (n_users, n_songs) = self.shape();
        debug_assert_eq!(rhs.nrows(), n_songs);
        let mut out = Array2::<f64>::zeros((n_users, rhs.ncols()));
        for (user, row) in self.matrix.outer_iterator().enumerate() {
            let mut out_row = out.row_mut(user);
            for (song, &plays) in row.iter() {
                out_row.scaled_add(plays, &rhs.row(song));
            }
        }
        out
    }

    /// Total plays per user, indexed by [`UserIndex`].
    pub fn plays_per_user(&self) -> Vec<f64> {
        self.matrix
            .outer_iterator()
            .map(|row| row.iter().map(|(_, &plays)| plays).sum())
            .collect()
    }

    /// Total plays per song, indexed by [`SongIndex`].
    pub fn plays_per_song(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.matrix.cols()];
        for row in self.matrix.outer_iterator() {
            for (song, &plays) in row.iter() {
                totals[song] += plays;
            }
        }
        totals
    }
}
