//! Typed failures raised by the classification core

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, ModelError>;

/// Every failure the model lifecycle can surface to a shell
#[derive(Debug, Error)]
pub enum ModelError {
    /// A hyperparameter setter received an out-of-range value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Training was requested before the dataset was loaded
    #[error("the dataset has not been loaded; load it before training the model")]
    NotLoaded,

    /// Evaluation or prediction was requested before a successful training run
    #[error("the model has not been trained; train it before evaluating or predicting")]
    NotTrained,

    /// Prediction input could not be normalized to a single 64-pixel sample
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// The repository could not store or restore a bundle
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The dataset source could not supply the digits data
    #[error("dataset source failed: {0}")]
    DataSource(String),
}

/// Repository I/O failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A bundle file does not exist yet
    #[error("no persisted model found at {}", .0.display())]
    Missing(PathBuf),

    /// Reading or writing a bundle file failed
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bundle file failed to parse or its checksum did not match
    #[error("persisted model is corrupt: {0}")]
    Corrupt(String),
}

impl ModelError {
    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub(crate) fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }

    /// True when the failure means nothing has been persisted yet
    pub fn is_missing(&self) -> bool {
        matches!(self, ModelError::Persistence(PersistenceError::Missing(_)))
    }
}
