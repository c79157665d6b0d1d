//! Schema of the music library database the engine reads from.
//!
//! `songs.path` is empty for songs without an audio file and `available` is 0
//! for songs removed from the library; both are hidden from every query.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};
use anyhow::Result;
use rusqlite::Connection;

const GENRE_FK: ForeignKey = ForeignKey {
    foreign_table: "genres",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const GENRES_TABLE: Table = Table {
    name: "genres",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const SONG_COLUMNS: &[Column] = &[
    sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
    sqlite_column!("title", &SqlType::Text, non_null = true),
    sqlite_column!(
        "genre",
        &SqlType::Integer,
        non_null = true,
        foreign_key = Some(&GENRE_FK)
    ),
    sqlite_column!("artist", &SqlType::Text),
    sqlite_column!("duration", &SqlType::Real),
    sqlite_column!(
        "path",
        &SqlType::Text,
        non_null = true,
        default_value = Some("''")
    ),
    sqlite_column!(
        "available",
        &SqlType::Integer,
        non_null = true,
        default_value = Some("1")
    ),
    sqlite_column!(
        "created_at",
        &SqlType::Text,
        default_value = Some("CURRENT_TIMESTAMP")
    ),
];

const FREQUENCY_COLUMNS: &[Column] = &[
    sqlite_column!("userid", &SqlType::Text, non_null = true),
    sqlite_column!(
        "songid",
        &SqlType::Integer,
        non_null = true,
        foreign_key = Some(&SONG_FK)
    ),
    sqlite_column!(
        "plays",
        &SqlType::Integer,
        non_null = true,
        default_value = Some("0")
    ),
];

const SONGS_TABLE_V0: Table = Table {
    name: "songs",
    columns: SONG_COLUMNS,
    indices: &[],
};

const FREQUENCY_TABLE_V0: Table = Table {
    name: "frequency",
    columns: FREQUENCY_COLUMNS,
    indices: &[],
};

const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: SONG_COLUMNS,
    indices: &[("idx_songs_genre", "genre"), ("idx_songs_title", "title")],
};

const FREQUENCY_TABLE: Table = Table {
    name: "frequency",
    columns: FREQUENCY_COLUMNS,
    indices: &[
        ("idx_frequency_userid", "userid"),
        ("idx_frequency_songid", "songid"),
    ],
};

/// Indices for the join and history lookups.
fn migrate_to_v1(conn: &Connection) -> Result<()> {
    SONGS_TABLE.create_indices(conn)?;
    FREQUENCY_TABLE.create_indices(conn)?;
    Ok(())
}

pub const RECOMMENDER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[GENRES_TABLE, SONGS_TABLE_V0, FREQUENCY_TABLE_V0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[GENRES_TABLE, SONGS_TABLE, FREQUENCY_TABLE],
        migration: Some(migrate_to_v1),
    },
];
