//! Shared constants for end-to-end tests
//!
//! The fixture library has six visible songs over three genres, one song
//! without an audio file and one removed from the library. When the fixture
//! data changes, update only this file and `fixtures.rs`.
#![allow(dead_code)]

// ============================================================================
// Songs
// ============================================================================

pub const SONG_BOHEMIAN_ID: i64 = 1;
pub const SONG_BOHEMIAN_TITLE: &str = "Bohemian Rhapsody";

pub const SONG_STAIRWAY_ID: i64 = 2;
pub const SONG_STAIRWAY_TITLE: &str = "Stairway to Heaven";

pub const SONG_HOTEL_ID: i64 = 3;
pub const SONG_HOTEL_TITLE: &str = "Hotel California";

pub const SONG_TAKE_FIVE_ID: i64 = 4;
pub const SONG_TAKE_FIVE_TITLE: &str = "Take Five";

pub const SONG_SO_WHAT_ID: i64 = 5;
pub const SONG_SO_WHAT_TITLE: &str = "So What";

pub const SONG_BILLIE_JEAN_ID: i64 = 6;
pub const SONG_BILLIE_JEAN_TITLE: &str = "Billie Jean";

/// Song with an empty path, invisible to every query
pub const SONG_NO_FILE_ID: i64 = 7;

/// Song with `available = 0`, invisible to every query
pub const SONG_REMOVED_ID: i64 = 8;

/// Never present in the database
pub const SONG_UNKNOWN_ID: i64 = 9999;

pub const VISIBLE_SONG_COUNT: u64 = 6;
pub const GENRE_COUNT: u64 = 3;

// ============================================================================
// Listeners
// ============================================================================

pub const USER_ALICE: &str = "alice";
pub const USER_ERIN: &str = "erin";
pub const USER_COUNT: u64 = 6;

/// Plays on visible songs only
pub const VISIBLE_PLAYS: u64 = 97;

/// Plays including the invisible songs
pub const ALL_PLAYS: u64 = 167;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the test server to accept requests
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Timeout of every test client request
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
