//! Test server lifecycle management
//!
//! Each test gets an isolated server over its own temporary music database.

use super::constants::*;
use super::fixtures::create_test_music_db;
use mw_recommender_server::metrics;
use mw_recommender_server::{
    make_app, EngineSettings, RecommendationEngine, RequestsLoggingLevel, ServerConfig,
    SqliteDataProvider,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Path of the music database, for direct writes in tests
    pub db_path: PathBuf,

    /// The engine behind the server
    pub engine: Arc<RecommendationEngine>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server whose engine is initialized from the fixture library
    /// before the first request.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(EngineSettings::default(), true).await
    }

    /// Spawns a server whose engine has not been initialized yet.
    pub async fn spawn_uninitialized() -> Self {
        Self::spawn_with_settings(EngineSettings::default(), false).await
    }

    /// # Panics
    ///
    /// Panics if the database, the engine or the listener cannot be set up,
    /// or if the server doesn't become ready within the timeout.
    pub async fn spawn_with_settings(settings: EngineSettings, initialize: bool) -> Self {
        metrics::init_metrics();

        let (temp_db_dir, db_path) =
            create_test_music_db().expect("Failed to create test database");
        let provider =
            Arc::new(SqliteDataProvider::new(&db_path).expect("Failed to open test database"));
        let engine = Arc::new(RecommendationEngine::new(provider, settings));
        if initialize {
            engine
                .initialize()
                .await
                .expect("Failed to initialize the engine");
        }

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            metrics_port: 0,
        };
        let app = make_app(config, engine.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            db_path,
            engine,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
