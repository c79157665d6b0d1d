//! End-to-end tests for the song, user and service routes

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::Value;

// ============================================================================
// Service
// ============================================================================

#[tokio::test]
async fn test_home_and_health() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_home().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "MW Music Recommender API is running");
    assert!(body["version"].is_string());

    let response = client.get_health().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "healthy");

    let engine = &body["recommendation_engine"];
    assert_eq!(engine["is_initialized"], true);
    // The fixture library is smaller than the factorization rank
    assert_eq!(engine["state"], "degraded_ready");
    assert_eq!(engine["factorization"], "raw");
    assert_eq!(engine["algorithms_available"].as_array().unwrap().len(), 4);
    assert!(engine["data_last_updated"].is_string());
}

#[tokio::test]
async fn test_stats_after_initialization() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_stats().await;
    assert_eq!(response.status(), StatusCode::OK);

    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["total_songs"], VISIBLE_SONG_COUNT);
    assert_eq!(stats["total_users"], USER_COUNT);
    assert_eq!(stats["total_plays"], VISIBLE_PLAYS);
    assert_eq!(stats["total_genres"], GENRE_COUNT);
    // 14 of 36 cells are filled
    assert_eq!(stats["sparsity"], 38.8889);
    assert_eq!(stats["avg_plays_per_user"], 16.17);
    assert_eq!(stats["avg_plays_per_song"], 16.17);
    assert_eq!(stats["matrix_shape"], serde_json::json!([6, 6]));

    // Repeated reads return the same snapshot
    let again: Value = client.get_stats().await.json().await.unwrap();
    assert_eq!(stats, again);
}

#[tokio::test]
async fn test_stats_before_initialization() {
    let server = TestServer::spawn_uninitialized().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_stats().await;
    assert_eq!(response.status(), StatusCode::OK);

    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["total_songs"], VISIBLE_SONG_COUNT);
    assert_eq!(stats["total_users"], USER_COUNT);
    assert_eq!(stats["total_plays"], ALL_PLAYS);
    assert_eq!(stats["total_genres"], GENRE_COUNT);
    assert!(stats["sparsity"].is_null());
    assert!(stats["matrix_shape"].is_null());
}

// ============================================================================
// Songs
// ============================================================================

#[tokio::test]
async fn test_get_song_details() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_song(SONG_TAKE_FIVE_ID).await;
    assert_eq!(response.status(), StatusCode::OK);

    let song: Value = response.json().await.unwrap();
    assert_eq!(song["song_id"], SONG_TAKE_FIVE_ID);
    assert_eq!(song["title"], SONG_TAKE_FIVE_TITLE);
    assert_eq!(song["genre"], "Jazz");
    assert_eq!(song["artist"], "Dave Brubeck");
    assert_eq!(song["duration"], 200.0);
    assert_eq!(song["path"], "/music/4.mp3");
}

#[tokio::test]
async fn test_invisible_songs_are_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    for song_id in [SONG_NO_FILE_ID, SONG_REMOVED_ID, SONG_UNKNOWN_ID] {
        let response = client.get_song(song_id).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "song {}", song_id);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], 404);
    }
}

#[tokio::test]
async fn test_search_songs() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.search("hotel", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["query"], "hotel");
    assert_eq!(body["total_found"], 1);
    assert_eq!(body["results"][0]["song_id"], SONG_HOTEL_ID);
    assert!(body["results"][0]["similarity_score"].is_null());

    // Matches are case insensitive and limited
    let body: Value = client.search("E", Some(2)).await.json().await.unwrap();
    assert_eq!(body["total_found"], 2);

    // Invisible songs never match
    let body: Value = client.search("Hidden", None).await.json().await.unwrap();
    assert_eq!(body["total_found"], 0);
}

#[tokio::test]
async fn test_search_validation() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.search("so", Some(0)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.search("so", Some(101)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.search("%20", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_user_history() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.user_history(USER_ALICE).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], USER_ALICE);
    assert_eq!(body["total_plays"], 24);
    let songs: Vec<i64> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["song_id"].as_i64().unwrap())
        .collect();
    assert_eq!(songs, vec![SONG_BOHEMIAN_ID, SONG_STAIRWAY_ID, SONG_HOTEL_ID]);
    assert_eq!(body["history"][0]["genre"], "Rock");
}

#[tokio::test]
async fn test_user_history_hides_invisible_songs() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.user_history(USER_ERIN).await.json().await.unwrap();
    let songs: Vec<i64> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["song_id"].as_i64().unwrap())
        .collect();
    assert_eq!(songs, vec![SONG_HOTEL_ID, SONG_BOHEMIAN_ID]);
    assert_eq!(body["total_plays"], 7);

    let response = client.user_history("nobody").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
