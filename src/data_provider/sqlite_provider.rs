//! SQLite backed [`SongDataProvider`].

use super::schema::RECOMMENDER_VERSIONED_SCHEMAS;
use super::SongDataProvider;
use crate::recommender::{CatalogSong, CountStats, Interaction, SongDetails, SongId, UserId, UserPlay};
use crate::metrics;
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// Songs without an audio file, or taken out of the library, are invisible.
const VISIBLE_SONG: &str = "s.path <> '' AND s.available = 1";

#[derive(Clone)]
pub struct SqliteDataProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDataProvider {
    /// Opens (creating it if missing) the music database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open music database at {:?}", db_path))?;

        let origin = open_versioned(&mut conn, RECOMMENDER_VERSIONED_SCHEMAS, "music")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let song_count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM songs s WHERE {}", VISIBLE_SONG),
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        info!(
            "Opened music database {:?} ({:?} schema): {} available songs",
            db_path, origin, song_count
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `query` on the blocking thread pool.
    async fn run<T, F>(&self, operation: &'static str, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let start = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow!("music database connection lock poisoned"))?;
            query(&conn)
        })
        .await
        .with_context(|| format!("Database task {} did not complete", operation))?;
        metrics::record_db_query(operation, start.elapsed());
        result.with_context(|| format!("Database query {} failed", operation))
    }
}

/// User ids are opaque, some libraries store them as integers.
fn user_id_at(row: &Row, index: usize) -> rusqlite::Result<UserId> {
    let id = match row.get_ref(index)? {
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        ValueRef::Null => String::new(),
    };
    Ok(UserId(id))
}

fn plays_at(row: &Row, index: usize) -> rusqlite::Result<u64> {
    let plays: i64 = row.get(index)?;
    Ok(plays.max(0) as u64)
}

fn song_details_from_row(row: &Row) -> rusqlite::Result<SongDetails> {
    Ok(SongDetails {
        song_id: SongId(row.get(0)?),
        title: row.get(1)?,
        genre: row.get(2)?,
        artist: row.get(3)?,
        duration: row.get(4)?,
        path: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Escapes LIKE wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl SongDataProvider for SqliteDataProvider {
    async fn fetch_interactions(&self) -> Result<Vec<Interaction>> {
        self.run("fetch_interactions", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT f.userid, f.songid, f.plays FROM frequency f \
                 JOIN songs s ON s.id = f.songid WHERE {}",
                VISIBLE_SONG
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok(Interaction {
                    user_id: user_id_at(row, 0)?,
                    song_id: SongId(row.get(1)?),
                    plays: plays_at(row, 2)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn fetch_song_catalog(&self) -> Result<Vec<CatalogSong>> {
        self.run("fetch_song_catalog", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT s.id, s.title, g.name, s.artist FROM songs s \
                 JOIN genres g ON g.id = s.genre WHERE {} ORDER BY s.id",
                VISIBLE_SONG
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok(CatalogSong {
                    song_id: SongId(row.get(0)?),
                    title: row.get(1)?,
                    genre: row.get(2)?,
                    artist: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn fetch_song_by_id(&self, song_id: SongId) -> Result<Option<SongDetails>> {
        self.run("fetch_song_by_id", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT s.id, s.title, g.name, s.artist, s.duration, s.path, s.created_at \
                 FROM songs s JOIN genres g ON g.id = s.genre WHERE s.id = ?1 AND {}",
                VISIBLE_SONG
            ))?;
            let mut rows = stmt.query_map(params![song_id.0], song_details_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
    }

    async fn fetch_count_stats(&self) -> Result<CountStats> {
        self.run("fetch_count_stats", |conn| {
            let song_count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM songs s WHERE {}", VISIBLE_SONG),
                [],
                |r| r.get(0),
            )?;
            let user_count: i64 =
                conn.query_row("SELECT COUNT(DISTINCT userid) FROM frequency", [], |r| {
                    r.get(0)
                })?;
            let total_plays: i64 =
                conn.query_row("SELECT COALESCE(SUM(plays), 0) FROM frequency", [], |r| {
                    r.get(0)
                })?;
            let genre_count: i64 = conn.query_row("SELECT COUNT(*) FROM genres", [], |r| r.get(0))?;

            Ok(CountStats {
                song_count: song_count as usize,
                user_count: user_count as usize,
                total_plays: total_plays.max(0) as u64,
                genre_count: genre_count as usize,
            })
        })
        .await
    }

    async fn search_songs_by_title(&self, query: &str, limit: usize) -> Result<Vec<SongDetails>> {
        let pattern = like_pattern(query);
        self.run("search_songs_by_title", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT s.id, s.title, g.name, s.artist, s.duration, s.path, s.created_at \
                 FROM songs s JOIN genres g ON g.id = s.genre \
                 WHERE s.title LIKE ?1 ESCAPE '\\' AND {} ORDER BY s.id LIMIT ?2",
                VISIBLE_SONG
            ))?;
            let rows = stmt.query_map(params![pattern, limit as i64], song_details_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn fetch_user_play_history(&self, user_id: &str) -> Result<Vec<UserPlay>> {
        let user_id = user_id.to_owned();
        self.run("fetch_user_play_history", move |conn| {
            // CAST lets integer user ids match their textual form
            let mut stmt = conn.prepare(&format!(
                "SELECT f.userid, f.songid, f.plays, s.title, g.name FROM frequency f \
                 JOIN songs s ON s.id = f.songid JOIN genres g ON g.id = s.genre \
                 WHERE CAST(f.userid AS TEXT) = ?1 AND {} \
                 ORDER BY f.plays DESC, f.songid ASC",
                VISIBLE_SONG
            ))?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(UserPlay {
                    user_id: user_id_at(row, 0)?,
                    song_id: SongId(row.get(1)?),
                    plays: plays_at(row, 2)?,
                    title: row.get(3)?,
                    genre: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        self.run("health_check", |conn| {
            let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0))?;
            if one != 1 {
                warn!("Unexpected health check result {}", one);
            }
            Ok(())
        })
        .await
    }
}
