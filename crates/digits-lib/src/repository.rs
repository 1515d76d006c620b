//! Model persistence
//!
//! A [`ModelBundle`] is stored as three JSON documents: the fitted classifier,
//! the latest evaluation result and the hyperparameters. The parameters file
//! is an envelope carrying the SHA256 checksums of the other two and is
//! written last, so a bundle only restores once all three files agree. Each
//! file is written to a temp path and renamed into place.

use crate::classifier::KnnState;
use crate::error::{PersistenceError, Result};
use crate::model::ModelBundle;
use crate::models::{EvaluationResult, HyperParameters};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

pub const DEFAULT_MODEL_FILE: &str = "knn_model.json";
pub const DEFAULT_PARAMS_FILE: &str = "knn_params.json";
pub const DEFAULT_RESULT_FILE: &str = "knn_results.json";

/// Stores and restores model bundles
pub trait Repository: Send + Sync {
    fn store(&self, bundle: &ModelBundle) -> Result<()>;

    fn restore(&self) -> Result<ModelBundle>;

    /// True when a bundle has been stored
    fn exists(&self) -> bool;
}

/// Parameters file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParamsEnvelope {
    params: HyperParameters,
    model_checksum: String,
    result_checksum: String,
    saved_at: DateTime<Utc>,
}

/// JSON triad on the local filesystem
#[derive(Debug, Clone)]
pub struct FileRepository {
    model_path: PathBuf,
    params_path: PathBuf,
    result_path: PathBuf,
}

impl FileRepository {
    /// Repository using the default file names inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::with_paths(
            dir.join(DEFAULT_MODEL_FILE),
            dir.join(DEFAULT_PARAMS_FILE),
            dir.join(DEFAULT_RESULT_FILE),
        )
    }

    pub fn with_paths(
        model_path: impl Into<PathBuf>,
        params_path: impl Into<PathBuf>,
        result_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            params_path: params_path.into(),
            result_path: result_path.into(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn params_path(&self) -> &Path {
        &self.params_path
    }

    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let io_err = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)?;
        Ok(())
    }

    fn read(path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PersistenceError::Missing(path.to_path_buf()).into()
            } else {
                PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                }
                .into()
            }
        })
    }

    fn parse<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            PersistenceError::Corrupt(format!("{}: {}", path.display(), e)).into()
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(value)
            .map_err(|e| PersistenceError::Corrupt(format!("failed to serialize: {}", e)).into())
    }
}

impl Repository for FileRepository {
    fn store(&self, bundle: &ModelBundle) -> Result<()> {
        let model_bytes = Self::encode(&bundle.classifier)?;
        let result_bytes = Self::encode(&bundle.result)?;
        let envelope = ParamsEnvelope {
            params: bundle.params,
            model_checksum: compute_checksum(&model_bytes),
            result_checksum: compute_checksum(&result_bytes),
            saved_at: Utc::now(),
        };

        Self::write_atomic(&self.model_path, &model_bytes)?;
        Self::write_atomic(&self.result_path, &result_bytes)?;
        Self::write_atomic(&self.params_path, &Self::encode(&envelope)?)?;

        debug!(
            path = %self.model_path.display(),
            checksum = %envelope.model_checksum,
            "Model bundle written"
        );
        Ok(())
    }

    fn restore(&self) -> Result<ModelBundle> {
        let envelope: ParamsEnvelope =
            Self::parse(&self.params_path, &Self::read(&self.params_path)?)?;
        let model_bytes = Self::read(&self.model_path)?;
        let result_bytes = Self::read(&self.result_path)?;

        verify_checksum(&self.model_path, &model_bytes, &envelope.model_checksum)?;
        verify_checksum(&self.result_path, &result_bytes, &envelope.result_checksum)?;
        envelope
            .params
            .validate()
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        let classifier: KnnState = Self::parse(&self.model_path, &model_bytes)?;
        let result: Option<EvaluationResult> = Self::parse(&self.result_path, &result_bytes)?;

        debug!(path = %self.model_path.display(), "Model bundle restored");
        Ok(ModelBundle {
            classifier,
            params: envelope.params,
            result,
        })
    }

    fn exists(&self) -> bool {
        self.model_path.exists() && self.params_path.exists() && self.result_path.exists()
    }
}

/// Keeps the latest bundle in memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    bundle: RwLock<Option<ModelBundle>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn store(&self, bundle: &ModelBundle) -> Result<()> {
        let mut slot = self
            .bundle
            .write()
            .map_err(|e| PersistenceError::Corrupt(format!("Lock poisoned: {}", e)))?;
        *slot = Some(bundle.clone());
        Ok(())
    }

    fn restore(&self) -> Result<ModelBundle> {
        let slot = self
            .bundle
            .read()
            .map_err(|e| PersistenceError::Corrupt(format!("Lock poisoned: {}", e)))?;
        slot.clone()
            .ok_or_else(|| PersistenceError::Missing(PathBuf::from("memory")).into())
    }

    fn exists(&self) -> bool {
        self.bundle.read().map(|b| b.is_some()).unwrap_or(false)
    }
}

fn verify_checksum(path: &Path, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = compute_checksum(bytes);
    if actual != expected {
        return Err(PersistenceError::Corrupt(format!(
            "checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        ))
        .into());
    }
    Ok(())
}

/// Hex-encoded SHA256 of `bytes`
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SyntheticDigits;
    use crate::error::ModelError;
    use crate::model::{ClassificationModel, PixelInput};
    use chrono::Utc;
    use ndarray::{array, Array2};
    use tempfile::TempDir;

    fn evaluated_model() -> ClassificationModel {
        let mut model = ClassificationModel::new();
        model.load(&SyntheticDigits::new(120, 8)).unwrap();
        model.set_seed(42).unwrap();
        model.set_k_fold(3);
        model.train().unwrap();
        model.evaluate().unwrap();
        model
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        assert!(!repo.exists());

        let model = evaluated_model();
        repo.store(&model.bundle().unwrap()).unwrap();
        assert!(repo.exists());

        let restored = ClassificationModel::from_bundle(repo.restore().unwrap()).unwrap();
        assert_eq!(restored.params(), model.params());

        let original = model.result().unwrap();
        let loaded = restored.result().unwrap();
        assert_eq!(loaded.accuracy, original.accuracy);
        assert_eq!(loaded.crossval_accuracy, original.crossval_accuracy);
        assert_eq!(loaded.confusion_matrix, original.confusion_matrix);
        assert_eq!(loaded.timestamp, original.timestamp);

        let sample = PixelInput::Flat(SyntheticDigits::glyph(2).to_vec());
        assert_eq!(restored.predict(&sample).unwrap(), model.predict(&sample).unwrap());
    }

    #[test]
    fn test_fractional_values_restore_exactly() {
        let features = Array2::from_shape_vec(
            (2, 2),
            vec![0.1, 1.0 / 3.0, 2.0 / 7.0, 1.0 / 11.0],
        )
        .unwrap();
        let bundle = ModelBundle {
            classifier: KnnState {
                k_neighbors: 1,
                features,
                labels: array![0, 1],
            },
            params: HyperParameters::default(),
            result: Some(EvaluationResult {
                accuracy: 1.0 / 11.0,
                crossval_accuracy: Some(7.0 / 13.0),
                timestamp: Utc::now(),
                feature_count: 2,
                total_records: 22,
                train_records: 11,
                test_records: 11,
                error_count: 10,
                class_labels: vec![0, 1],
                confusion_matrix: vec![vec![1, 5], vec![5, 0]],
            }),
        };

        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.store(&bundle).unwrap();
        let restored = repo.restore().unwrap();

        let stored = bundle.result.as_ref().unwrap();
        let loaded = restored.result.as_ref().unwrap();
        assert_eq!(loaded.accuracy.to_bits(), stored.accuracy.to_bits());
        assert_eq!(
            loaded.crossval_accuracy.map(f64::to_bits),
            stored.crossval_accuracy.map(f64::to_bits)
        );
        for (a, b) in restored
            .classifier
            .features
            .iter()
            .zip(bundle.classifier.features.iter())
        {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(restored, bundle);
    }

    #[test]
    fn test_failed_result_write_does_not_restore_mixed_bundle() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.store(&evaluated_model().bundle().unwrap()).unwrap();

        let mut retrained = ClassificationModel::new();
        retrained.load(&SyntheticDigits::new(80, 5)).unwrap();
        retrained.set_seed(7).unwrap();
        retrained.train().unwrap();
        let newer = retrained.bundle().unwrap();

        // a directory squatting on the temp path makes the result write fail
        let blocker = repo.result_path().with_extension("tmp");
        fs::create_dir(&blocker).unwrap();
        assert!(matches!(
            repo.store(&newer),
            Err(ModelError::Persistence(PersistenceError::Io { .. }))
        ));
        assert!(matches!(
            repo.restore(),
            Err(ModelError::Persistence(PersistenceError::Corrupt(_)))
        ));

        fs::remove_dir(&blocker).unwrap();
        repo.store(&newer).unwrap();
        assert_eq!(repo.restore().unwrap(), newer);
    }

    #[test]
    fn test_restore_missing() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path().join("absent"));
        let err = repo.restore().unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_tampered_model_detected() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.store(&evaluated_model().bundle().unwrap()).unwrap();

        let mut bytes = fs::read(repo.model_path()).unwrap();
        bytes.push(b'\n');
        fs::write(repo.model_path(), bytes).unwrap();

        assert!(matches!(
            repo.restore(),
            Err(ModelError::Persistence(PersistenceError::Corrupt(_)))
        ));
    }

    #[test]
    fn test_corrupt_result_file() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.store(&evaluated_model().bundle().unwrap()).unwrap();
        fs::write(repo.result_path(), b"{not json").unwrap();

        assert!(matches!(
            repo.restore(),
            Err(ModelError::Persistence(PersistenceError::Corrupt(_)))
        ));
    }

    #[test]
    fn test_trained_without_result_round_trips() {
        let mut model = ClassificationModel::new();
        model.load(&SyntheticDigits::new(60, 2)).unwrap();
        model.train().unwrap();

        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.store(&model.bundle().unwrap()).unwrap();

        let bundle = repo.restore().unwrap();
        assert!(bundle.result.is_none());
        assert_eq!(bundle.params, *model.params());
    }

    #[test]
    fn test_memory_repository() {
        let repo = MemoryRepository::new();
        assert!(!repo.exists());
        assert!(repo.restore().unwrap_err().is_missing());

        let bundle = evaluated_model().bundle().unwrap();
        repo.store(&bundle).unwrap();
        assert!(repo.exists());
        assert_eq!(repo.restore().unwrap(), bundle);
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(compute_checksum(b"digits"), compute_checksum(b"digits"));
        assert_ne!(compute_checksum(b"digits"), compute_checksum(b"digit"));
        assert_eq!(compute_checksum(b"").len(), 64);
    }
}
