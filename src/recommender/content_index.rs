//! Genre based content similarity over the song catalog.
//!
//! Rows follow the order of the catalog table as returned by the data
//! provider. That index space is unrelated to the interaction matrix columns.

use super::error::{RecommendationError, RecommendationResult};
use super::fuzzy;
use super::models::{CatalogSong, SongInfo};
use ndarray::{Array2, Axis};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Position of a song in the catalog table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentRow(pub usize);

pub struct ContentIndex {
    songs: Vec<CatalogSong>,
    genres: Vec<String>,
    /// songs x genres, exactly one 1 per row.
    genre_matrix: Array2<f64>,
    /// songs x songs cosine similarity of the genre rows.
    similarity: Array2<f64>,
    /// First row carrying each title.
    title_rows: HashMap<String, ContentRow>,
}

impl ContentIndex {
    pub fn build(songs: Vec<CatalogSong>) -> RecommendationResult<Self> {
        if songs.is_empty() {
            return Err(RecommendationError::DataError(
                "Song catalog is empty".to_string(),
            ));
        }

        let genres: Vec<String> = songs
            .iter()
            .map(|s| s.genre.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let genre_columns: HashMap<&str, usize> = genres
            .iter()
            .enumerate()
            .map(|(column, genre)| (genre.as_str(), column))
            .collect();

        let mut genre_matrix = Array2::<f64>::zeros((songs.len(), genres.len()));
        for (row, song) in songs.iter().enumerate() {
            let column = genre_columns[song.genre.as_str()];
            genre_matrix[[row, column]] = 1.0;
        }

        let similarity = cosine_similarity(&genre_matrix);

        let mut title_rows = HashMap::with_capacity(songs.len());
        for (row, song) in songs.iter().enumerate() {
            title_rows
                .entry(song.title.clone())
                .or_insert(ContentRow(row));
        }

        info!(
            "Content index built: {} songs, {} genres",
            songs.len(),
            genres.len()
        );

        Ok(Self {
            songs,
            genres,
            genre_matrix,
            similarity,
            title_rows,
        })
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn genre_matrix(&self) -> &Array2<f64> {
        &self.genre_matrix
    }

    pub fn similarity(&self, a: ContentRow, b: ContentRow) -> f64 {
        self.similarity[[a.0, b.0]]
    }

    pub fn song(&self, row: ContentRow) -> Option<&CatalogSong> {
        self.songs.get(row.0)
    }

    /// Resolves free text to the catalog title scoring best against it.
    pub fn match_title(&self, query: &str) -> RecommendationResult<(ContentRow, &str)> {
        let (position, score) = fuzzy::best_match(query, self.songs.iter().map(|s| s.title.as_str()))
            .ok_or_else(|| RecommendationError::NotFound(format!("Song '{}' not found", query)))?;
        let matched_title = self.songs[position].title.as_str();
        let row = self.title_rows.get(matched_title).copied().ok_or_else(|| {
            RecommendationError::NotFound(format!("Song '{}' not found in the content index", matched_title))
        })?;
        debug!(
            "Matched '{}' to '{}' (score {})",
            query, matched_title, score
        );
        Ok((row, matched_title))
    }

    /// Top `n` rows by similarity to `row`, never including `row` itself.
    pub fn most_similar(&self, row: ContentRow, n: usize) -> Vec<(ContentRow, f64)> {
        let mut scored: Vec<(ContentRow, f64)> = self
            .similarity
            .row(row.0)
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != row.0)
            .map(|(other, &score)| (ContentRow(other), score))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(n);
        scored
    }

    pub fn recommend(&self, row: ContentRow, n: usize) -> Vec<SongInfo> {
        self.most_similar(row, n)
            .into_iter()
            .filter_map(|(other, score)| {
                self.song(other).map(|song| SongInfo {
                    song_id: song.song_id,
                    title: song.title.clone(),
                    genre: Some(song.genre.clone()),
                    artist: song.artist.clone(),
                    similarity_score: Some(score),
                })
            })
            .collect()
    }
}

fn cosine_similarity(m: &Array2<f64>) -> Array2<f64> {
    let mut normalized = m.clone();
    for mut row in normalized.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    normalized.dot(&normalized.t())
}
