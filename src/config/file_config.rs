use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub refresh_interval_secs: Option<u64>,

    pub engine: Option<EngineFileConfig>,
}

/// The `[engine]` table.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EngineFileConfig {
    pub svd_components: Option<usize>,
    pub svd_iterations: Option<usize>,
    pub svd_seed: Option<u64>,
    pub svd_oversamples: Option<usize>,
    pub bayesian_confidence_weight: Option<f64>,
    pub default_k_neighbors: Option<usize>,
    pub max_k_neighbors: Option<usize>,
    pub default_recommendations: Option<usize>,
    pub max_recommendations: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            db_path = "/data/music.db"
            port = 8080
            metrics_port = 9100
            logging_level = "headers"
            refresh_interval_secs = 3600

            [engine]
            svd_components = 32
            svd_iterations = 5
            svd_seed = 7
            svd_oversamples = 4
            bayesian_confidence_weight = 2.5
            default_k_neighbors = 5
            max_k_neighbors = 20
            default_recommendations = 15
            max_recommendations = 40
        "#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.db_path, Some("/data/music.db".to_string()));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.logging_level, Some("headers".to_string()));
        assert_eq!(config.refresh_interval_secs, Some(3600));

        let engine = config.engine.unwrap();
        assert_eq!(engine.svd_components, Some(32));
        assert_eq!(engine.svd_iterations, Some(5));
        assert_eq!(engine.svd_seed, Some(7));
        assert_eq!(engine.svd_oversamples, Some(4));
        assert_eq!(engine.bayesian_confidence_weight, Some(2.5));
        assert_eq!(engine.default_k_neighbors, Some(5));
        assert_eq!(engine.max_k_neighbors, Some(20));
        assert_eq!(engine.default_recommendations, Some(15));
        assert_eq!(engine.max_recommendations, Some(40));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: FileConfig = toml::from_str("port = 8001\n").unwrap();
        assert_eq!(config.port, Some(8001));
        assert!(config.db_path.is_none());
        assert!(config.engine.is_none());

        let config: FileConfig = toml::from_str("[engine]\nsvd_components = 8\n").unwrap();
        let engine = config.engine.unwrap();
        assert_eq!(engine.svd_components, Some(8));
        assert!(engine.svd_seed.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_path = \"/tmp/music.db\"").unwrap();
        writeln!(file, "refresh_interval_secs = 60").unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path, Some("/tmp/music.db".to_string()));
        assert_eq!(config.refresh_interval_secs, Some(60));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result = FileConfig::load(file.path());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = FileConfig::load(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
