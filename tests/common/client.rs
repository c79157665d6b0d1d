//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per route. When API routes or request
//! formats change, update only this file.
#![allow(dead_code)]

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Service
    // ========================================================================

    pub async fn get_home(&self) -> Response {
        self.get("/").await
    }

    pub async fn get_health(&self) -> Response {
        self.get("/health").await
    }

    pub async fn get_stats(&self) -> Response {
        self.get("/stats").await
    }

    pub async fn reinitialize(&self) -> Response {
        self.client
            .post(self.url("/admin/reinitialize"))
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Recommendations
    // ========================================================================

    pub async fn similar_songs(&self, song_id: i64, k: Option<i64>, metric: Option<&str>) -> Response {
        let mut body = json!({ "song_id": song_id });
        if let Some(k) = k {
            body["k"] = json!(k);
        }
        if let Some(metric) = metric {
            body["metric"] = json!(metric);
        }
        self.post("/recommendations/similar-songs", body).await
    }

    /// Sends an arbitrary body, for validation tests
    pub async fn similar_songs_raw(&self, body: Value) -> Response {
        self.post("/recommendations/similar-songs", body).await
    }

    pub async fn content_based(&self, title: &str, n: Option<i64>) -> Response {
        let mut body = json!({ "song_title": title });
        if let Some(n) = n {
            body["n_recommendations"] = json!(n);
        }
        self.post("/recommendations/content-based", body).await
    }

    pub async fn popular(&self, limit: Option<i64>, algorithm: Option<&str>) -> Response {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(algorithm) = algorithm {
            query.push(("algorithm", algorithm.to_string()));
        }
        self.client
            .get(self.url("/recommendations/popular"))
            .query(&query)
            .send()
            .await
            .expect("GET request failed")
    }

    // ========================================================================
    // Songs and users
    // ========================================================================

    pub async fn get_song(&self, song_id: i64) -> Response {
        self.get(&format!("/songs/{}", song_id)).await
    }

    pub async fn search(&self, query: &str, limit: Option<i64>) -> Response {
        let mut request = self
            .client
            .get(self.url(&format!("/songs/search/{}", query)));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        request.send().await.expect("GET request failed")
    }

    pub async fn user_history(&self, user_id: &str) -> Response {
        self.get(&format!("/users/{}/history", user_id)).await
    }
}
