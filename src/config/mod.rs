mod file_config;

pub use file_config::{EngineFileConfig, FileConfig};

use crate::recommender::{EngineSettings, QueryLimits, ReducerSettings};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub create_db: bool,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// 0 disables the periodic rebuild.
    pub refresh_interval_secs: u64,
    pub engine: EngineSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if !cli.create_db && !db_path.exists() {
            bail!(
                "Database file does not exist: {:?} (use --create-db to create it)",
                db_path
            );
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port && port != 0 {
            bail!("port and metrics_port must differ, both are {}", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let refresh_interval_secs = file
            .refresh_interval_secs
            .unwrap_or(cli.refresh_interval_secs);

        let engine = resolve_engine_settings(file.engine.unwrap_or_default())?;

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            refresh_interval_secs,
            engine,
        })
    }
}

fn resolve_engine_settings(file: EngineFileConfig) -> Result<EngineSettings> {
    let reducer_defaults = ReducerSettings::default();
    let reducer = ReducerSettings {
        rank: file.svd_components.unwrap_or(reducer_defaults.rank),
        iterations: file.svd_iterations.unwrap_or(reducer_defaults.iterations),
        seed: file.svd_seed.unwrap_or(reducer_defaults.seed),
        oversamples: file.svd_oversamples.unwrap_or(reducer_defaults.oversamples),
    };
    if reducer.rank == 0 {
        bail!("engine.svd_components must be at least 1");
    }

    if let Some(weight) = file.bayesian_confidence_weight {
        if !weight.is_finite() || weight < 0.0 {
            bail!(
                "engine.bayesian_confidence_weight must be a non-negative number, got {}",
                weight
            );
        }
    }

    let limits_defaults = QueryLimits::default();
    let limits = QueryLimits {
        default_k_neighbors: file
            .default_k_neighbors
            .unwrap_or(limits_defaults.default_k_neighbors),
        max_k_neighbors: file
            .max_k_neighbors
            .unwrap_or(limits_defaults.max_k_neighbors),
        default_recommendations: file
            .default_recommendations
            .unwrap_or(limits_defaults.default_recommendations),
        max_recommendations: file
            .max_recommendations
            .unwrap_or(limits_defaults.max_recommendations),
    };
    check_limit(
        "default_k_neighbors",
        limits.default_k_neighbors,
        "max_k_neighbors",
        limits.max_k_neighbors,
    )?;
    check_limit(
        "default_recommendations",
        limits.default_recommendations,
        "max_recommendations",
        limits.max_recommendations,
    )?;
    // Content based recommendations are bounded by the neighbor maximum
    check_limit(
        "default_recommendations",
        limits.default_recommendations,
        "max_k_neighbors",
        limits.max_k_neighbors,
    )?;

    Ok(EngineSettings {
        reducer,
        bayesian_confidence_weight: file.bayesian_confidence_weight,
        limits,
    })
}

fn check_limit(default_name: &str, default: usize, max_name: &str, max: usize) -> Result<()> {
    if default == 0 {
        bail!("engine.{} must be at least 1", default_name);
    }
    if default > max {
        bail!(
            "engine.{} ({}) must not exceed engine.{} ({})",
            default_name,
            default,
            max_name,
            max
        );
    }
    Ok(())
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
