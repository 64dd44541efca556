//! Configuration management for imgpool
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use imgpool::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Download workers: {}", config.pool.worker_num);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `IMGPOOL__<section>__<key>`
//!
//! Examples:
//! - `IMGPOOL__POOL__WORKER_NUM=8`
//! - `IMGPOOL__QUEUE__BACKEND=fjall`
//! - `IMGPOOL__QUEUE__URL=redis://queue.internal:6379`
//! - `IMGPOOL__STORAGE__CHUNK_SIZE=64KB`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/imgpool.toml`.
//! This can be overridden using the `IMGPOOL_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, HttpConfig, LoggingConfig, PoolConfig, QueueBackend, QueueConfig, SourceConfig,
    StorageConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`IMGPOOL__*`)
    /// 2. TOML file (default: `config/imgpool.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load(Some(path))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from all sources without validating
    ///
    /// For callers that adjust the result (CLI overrides) before calling
    /// [`Config::validate`] themselves.
    pub fn load_unvalidated(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Ok(sources::load(path)?)
    }

    /// Validate, e.g. after CLI overrides were applied
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[pool]\nworker_num = 2\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.pool.worker_num, 2);
        assert_eq!(config.queue.backend, QueueBackend::Redis);
    }

    #[test]
    fn test_validation_runs_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[source]
listing_url = "https://example.com/latest"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingPagePlaceholder(_))
        ));
    }

    #[test]
    fn test_shipped_config_file() {
        let path = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/config/imgpool.toml"));

        let config = Config::load_from_path(path).unwrap();
        assert_eq!(config.source.repeat_sentinel, Some(3));
        assert_eq!(config.pool.max_idle_polls, 60);
        assert_eq!(config.queue.backend, QueueBackend::Redis);
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[pool]\nworker_num = \"many\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::LoadError(_)));
    }
}
