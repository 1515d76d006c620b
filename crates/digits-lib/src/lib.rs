//! Digit classifier library
//!
//! This crate provides the core functionality for:
//! - Loading the 8x8 handwritten digits dataset
//! - Training and evaluating a k-nearest-neighbors classifier
//! - Persisting trained models
//! - Command/query wrappers shared by the HTTP and CLI shells
//! - Observability helpers for those shells

pub mod classifier;
pub mod commands;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod models;
pub mod observability;
pub mod repository;

pub use classifier::{Classifier, KnnClassifier};
pub use commands::{
    CommandRegistry, CommandResult, ErrorKind, ParamsQuery, PredictCommand, PredictInput,
    PredictionOutput, ResultQuery, TrainCommand, TrainInput,
};
pub use dataset::{CsvDigitsSource, DataSource, Dataset, InMemorySource, UnconfiguredSource};
#[cfg(feature = "synthetic")]
pub use dataset::SyntheticDigits;
pub use error::{ModelError, PersistenceError, Result};
pub use model::{ClassificationModel, ModelBundle, ModelState, PixelInput};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use repository::{FileRepository, MemoryRepository, Repository};
