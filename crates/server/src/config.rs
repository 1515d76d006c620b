//! Server configuration

use anyhow::{Context, Result};
use digits_lib::{CsvDigitsSource, DataSource, UnconfiguredSource};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Server configuration, read from `DIGITS_*` environment variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the API, health and metrics
    #[serde(default = "default_port")]
    pub port: u16,

    /// Headerless digits CSV; training fails until it is set
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,

    /// Directory holding the persisted model files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

fn default_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            dataset_path: None,
            model_dir: default_model_dir(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("DIGITS").try_parsing(true))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid DIGITS_* configuration")
    }

    /// Source for training data; without a dataset path every load fails
    pub fn data_source(&self) -> Arc<dyn DataSource> {
        match &self.dataset_path {
            Some(path) => Arc::new(CsvDigitsSource::new(path)),
            None => Arc::new(UnconfiguredSource::new(
                "set DIGITS_DATASET_PATH to a headerless digits.csv",
            )),
        }
    }
}
