//! Test fixture creation for the music database

use super::constants::*;
use anyhow::Result;
use mw_recommender_server::SqliteDataProvider;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a temporary music database with the fixture library.
/// Returns (temp_dir, db_path).
pub fn create_test_music_db() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("music.db");

    // Opening the provider creates the schema
    drop(SqliteDataProvider::new(&db_path)?);

    let conn = Connection::open(&db_path)?;
    conn.execute_batch(
        "INSERT INTO genres (id, name) VALUES (1, 'Rock'), (2, 'Jazz'), (3, 'Pop');",
    )?;

    let songs: [(i64, &str, i64, Option<&str>, &str, i64); 8] = [
        (SONG_BOHEMIAN_ID, SONG_BOHEMIAN_TITLE, 1, Some("Queen"), "/music/1.mp3", 1),
        (SONG_STAIRWAY_ID, SONG_STAIRWAY_TITLE, 1, Some("Led Zeppelin"), "/music/2.mp3", 1),
        (SONG_HOTEL_ID, SONG_HOTEL_TITLE, 1, Some("Eagles"), "/music/3.mp3", 1),
        (SONG_TAKE_FIVE_ID, SONG_TAKE_FIVE_TITLE, 2, Some("Dave Brubeck"), "/music/4.mp3", 1),
        (SONG_SO_WHAT_ID, SONG_SO_WHAT_TITLE, 2, Some("Miles Davis"), "/music/5.mp3", 1),
        (SONG_BILLIE_JEAN_ID, SONG_BILLIE_JEAN_TITLE, 3, None, "/music/6.mp3", 1),
        (SONG_NO_FILE_ID, "Hidden Track", 3, None, "", 1),
        (SONG_REMOVED_ID, "Retired Song", 2, None, "/music/8.mp3", 0),
    ];
    for (id, title, genre, artist, path, available) in songs {
        conn.execute(
            "INSERT INTO songs (id, title, genre, artist, duration, path, available) \
             VALUES (?1, ?2, ?3, ?4, 200.0, ?5, ?6)",
            params![id, title, genre, artist, path, available],
        )?;
    }

    add_listening_data(
        &db_path,
        &[
            (USER_ALICE, SONG_BOHEMIAN_ID, 10),
            (USER_ALICE, SONG_STAIRWAY_ID, 8),
            (USER_ALICE, SONG_HOTEL_ID, 6),
            ("bob", SONG_BOHEMIAN_ID, 7),
            ("bob", SONG_STAIRWAY_ID, 9),
            ("bob", SONG_BILLIE_JEAN_ID, 1),
            ("carol", SONG_TAKE_FIVE_ID, 12),
            ("carol", SONG_SO_WHAT_ID, 9),
            ("dave", SONG_TAKE_FIVE_ID, 5),
            ("dave", SONG_SO_WHAT_ID, 6),
            ("dave", SONG_BILLIE_JEAN_ID, 2),
            (USER_ERIN, SONG_BOHEMIAN_ID, 3),
            (USER_ERIN, SONG_HOTEL_ID, 4),
            (USER_ERIN, SONG_NO_FILE_ID, 50),
            (USER_ERIN, SONG_REMOVED_ID, 20),
            ("frank", SONG_BILLIE_JEAN_ID, 15),
        ],
    )?;

    Ok((dir, db_path))
}

/// Appends play counts to the `frequency` table.
pub fn add_listening_data(db_path: &Path, plays: &[(&str, i64, i64)]) -> Result<()> {
    let conn = Connection::open(db_path)?;
    let mut stmt = conn.prepare("INSERT INTO frequency (userid, songid, plays) VALUES (?1, ?2, ?3)")?;
    for (user, song, count) in plays {
        stmt.execute(params![user, song, count])?;
    }
    Ok(())
}
