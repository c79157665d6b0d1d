use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::path::PathBuf;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mw_recommender_server::config::{AppConfig, CliConfig, FileConfig};
use mw_recommender_server::metrics;
use mw_recommender_server::{
    run_server, RecommendationEngine, RequestsLoggingLevel, ServerConfig, SqliteDataProvider,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file, its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite music database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Create an empty database if none exists at db_path.
    #[clap(long)]
    pub create_db: bool,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Seconds between engine rebuilds from the database. Set to 0 to disable.
    #[clap(long, default_value_t = 0)]
    pub refresh_interval_secs: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            create_db: self.create_db,
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            refresh_interval_secs: self.refresh_interval_secs,
        }
    }
}

fn spawn_initial_build(engine: Arc<RecommendationEngine>) {
    tokio::spawn(async move {
        match engine.initialize().await {
            Ok(status) => info!("Recommendation engine ready ({:?})", status.state),
            Err(e) => error!(
                "Startup initialization failed, serving without recommendations: {}",
                e
            ),
        }
    });
}

fn spawn_refresh_loop(engine: Arc<RecommendationEngine>, interval_secs: u64) {
    info!("Engine refresh enabled: every {} seconds", interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

        // Skip the first immediate tick, the startup build covers it
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = engine.initialize().await {
                warn!("Periodic rebuild failed, keeping the previous snapshot: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening SQLite music database at {:?}...", config.db_path);
    let provider = Arc::new(SqliteDataProvider::new(&config.db_path)?);
    let engine = Arc::new(RecommendationEngine::new(provider, config.engine.clone()));

    spawn_initial_build(engine.clone());
    if config.refresh_interval_secs > 0 {
        spawn_refresh_loop(engine.clone(), config.refresh_interval_secs);
    }

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    run_server(
        engine,
        ServerConfig {
            requests_logging_level: config.logging_level,
            port: config.port,
            metrics_port: config.metrics_port,
        },
    )
    .await
}
