use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all recommender metrics
const PREFIX: &str = "mw_recommender";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Engine lifecycle
    pub static ref ENGINE_INITIALIZATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_engine_initializations_total"), "Engine (re)initializations by outcome"),
        &["status"]
    ).expect("Failed to create engine_initializations_total metric");

    pub static ref ENGINE_INITIALIZATION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_engine_initialization_duration_seconds"),
            "Time spent loading data and building the engine structures"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0])
    ).expect("Failed to create engine_initialization_duration_seconds metric");

    pub static ref ENGINE_FACTORIZATION_FALLBACK: Gauge = Gauge::new(
        format!("{PREFIX}_engine_factorization_fallback"),
        "1 when neighbor search runs on the raw interaction matrix"
    ).expect("Failed to create engine_factorization_fallback metric");

    pub static ref ENGINE_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_engine_items_total"), "Items in the published engine snapshot"),
        &["type"]
    ).expect("Failed to create engine_items_total metric");

    pub static ref SKIPPED_SONGS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_skipped_songs_total"), "Ranked songs dropped because their details are unavailable"),
        &["operation"]
    ).expect("Failed to create skipped_songs_total metric");

    // Query Metrics
    pub static ref QUERIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_queries_total"), "Recommendation queries by kind and outcome"),
        &["kind", "status"]
    ).expect("Failed to create queries_total metric");

    pub static ref QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_query_duration_seconds"),
            "Recommendation query duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["kind"]
    ).expect("Failed to create query_duration_seconds metric");

    // Database Metrics
    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_db_query_duration_seconds"),
            "Database query duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation"]
    ).expect("Failed to create db_query_duration_seconds metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Error responses by type and status code"),
        &["error_type", "status"]
    ).expect("Failed to create errors_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Already registered metrics are ignored, tests call this repeatedly
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ENGINE_INITIALIZATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ENGINE_INITIALIZATION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ENGINE_FACTORIZATION_FALLBACK.clone()));
    let _ = REGISTRY.register(Box::new(ENGINE_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SKIPPED_SONGS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUERIES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUERY_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(DB_QUERY_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Maps a request path to its route template to bound label cardinality
pub fn categorize_endpoint(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        [""] => "/",
        ["health"] => "/health",
        ["stats"] => "/stats",
        ["recommendations", "similar-songs"] => "/recommendations/similar-songs",
        ["recommendations", "content-based"] => "/recommendations/content-based",
        ["recommendations", "popular"] => "/recommendations/popular",
        ["songs", "search", _] => "/songs/search/{query}",
        ["songs", _] => "/songs/{song_id}",
        ["users", _, "history"] => "/users/{user_id}/history",
        ["admin", "reinitialize"] => "/admin/reinitialize",
        _ => "other",
    }
}

/// Record the outcome of an engine (re)initialization
pub fn record_engine_initialization(success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    ENGINE_INITIALIZATIONS_TOTAL
        .with_label_values(&[status])
        .inc();
    ENGINE_INITIALIZATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Publish the sizes of a freshly built snapshot
pub fn set_engine_snapshot(songs: usize, users: usize, genres: usize, degraded: bool) {
    ENGINE_ITEMS_TOTAL
        .with_label_values(&["song"])
        .set(songs as f64);
    ENGINE_ITEMS_TOTAL
        .with_label_values(&["user"])
        .set(users as f64);
    ENGINE_ITEMS_TOTAL
        .with_label_values(&["genre"])
        .set(genres as f64);
    ENGINE_FACTORIZATION_FALLBACK.set(if degraded { 1.0 } else { 0.0 });
}

pub fn record_skipped_song(operation: &str) {
    SKIPPED_SONGS_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a recommendation query
pub fn record_query(kind: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    QUERIES_TOTAL.with_label_values(&[kind, status]).inc();
    QUERY_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a database query
pub fn record_db_query(operation: &str, duration: Duration) {
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record an error response
pub fn record_error(error_type: &str, status: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, status])
        .inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // Resident Set Size in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
