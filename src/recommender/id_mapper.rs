//! Bidirectional mapping between external identifiers and dense matrix indices.

use super::error::{RecommendationError, RecommendationResult};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::hash::Hash;

/// Row index of a user in the interaction matrix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserIndex(pub usize);

/// Column index of a song in the interaction matrix, also the row of the song
/// in the factor space. Unrelated to [`super::content_index::ContentRow`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongIndex(pub usize);

impl From<usize> for UserIndex {
    fn from(value: usize) -> Self {
        UserIndex(value)
    }
}

impl From<usize> for SongIndex {
    fn from(value: usize) -> Self {
        SongIndex(value)
    }
}

impl From<UserIndex> for usize {
    fn from(value: UserIndex) -> Self {
        value.0
    }
}

impl From<SongIndex> for usize {
    fn from(value: SongIndex) -> Self {
        value.0
    }
}

/// Indices are assigned in ascending order of the unique keys, so the same set
/// of keys always yields the same mapping regardless of input order.
#[derive(Debug, Clone)]
pub struct IdMapper<K, I> {
    forward: HashMap<K, I>,
    backward: Vec<K>,
}

impl<K, I> IdMapper<K, I>
where
    K: Ord + Hash + Clone + Display,
    I: Copy + From<usize> + Into<usize>,
{
    pub fn build<'a, It>(ids: It) -> Self
    where
        It: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let unique: BTreeSet<&K> = ids.into_iter().collect();
        let backward: Vec<K> = unique.into_iter().cloned().collect();
        let forward = backward
            .iter()
            .enumerate()
            .map(|(index, key)| (key.clone(), I::from(index)))
            .collect();
        Self { forward, backward }
    }

    pub fn len(&self) -> usize {
        self.backward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backward.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    pub fn index_of(&self, key: &K) -> RecommendationResult<I> {
        self.forward
            .get(key)
            .copied()
            .ok_or_else(|| RecommendationError::NotFound(format!("ID {} not found", key)))
    }

    pub fn key_of(&self, index: I) -> Option<&K> {
        self.backward.get(index.into())
    }

    pub fn keys(&self) -> &[K] {
        &self.backward
    }
}
