//! Core value types for the classification model

use crate::error::{ModelError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default held-out fraction
pub const DEFAULT_TEST_SIZE: f64 = 0.3;

/// Default neighbor count
pub const DEFAULT_K_NEIGHBORS: usize = 3;

/// Validated training knobs.
///
/// Values are never patched in place: every `with_*` call returns a new
/// `HyperParameters`, leaving the receiver untouched when validation fails.
/// The default seed is 0, which is a valid split seed but cannot be set
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperParameters {
    seed: u64,
    test_size: f64,
    k_neighbors: usize,
    k_fold: usize,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            seed: 0,
            test_size: DEFAULT_TEST_SIZE,
            k_neighbors: DEFAULT_K_NEIGHBORS,
            k_fold: 0,
        }
    }
}

impl HyperParameters {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn test_size(&self) -> f64 {
        self.test_size
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    pub fn k_fold(&self) -> usize {
        self.k_fold
    }

    /// Replace the random-generator seed; must be greater than zero
    pub fn with_seed(&self, seed: u64) -> Result<Self> {
        if seed == 0 {
            return Err(ModelError::invalid_parameter(
                "the random generator seed must be greater than zero",
            ));
        }
        Ok(Self { seed, ..*self })
    }

    /// Replace the held-out fraction; must lie strictly between 0 and 1
    pub fn with_test_size(&self, test_size: f64) -> Result<Self> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ModelError::invalid_parameter(format!(
                "the test size must be between 0 and 1, got {}",
                test_size
            )));
        }
        Ok(Self { test_size, ..*self })
    }

    /// Replace the neighbor count; must be greater than zero
    pub fn with_k_neighbors(&self, k_neighbors: usize) -> Result<Self> {
        if k_neighbors == 0 {
            return Err(ModelError::invalid_parameter(
                "the number of neighbors must be greater than zero",
            ));
        }
        Ok(Self {
            k_neighbors,
            ..*self
        })
    }

    /// Replace the fold count; 0 disables cross-validation
    pub fn with_k_fold(&self, k_fold: usize) -> Self {
        Self { k_fold, ..*self }
    }

    /// Check invariants on values that bypassed the setters (deserialized bundles)
    pub fn validate(&self) -> Result<()> {
        self.with_test_size(self.test_size)?;
        self.with_k_neighbors(self.k_neighbors)?;
        Ok(())
    }
}

/// A partial hyperparameter change as received from a shell.
///
/// Fields are signed so that out-of-range input from users is reported as
/// `InvalidParameter` instead of failing to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_neighbors: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_fold: Option<i64>,
}

impl ParamsUpdate {
    /// Apply every present field to `params`, all-or-nothing
    pub fn apply(&self, params: &HyperParameters) -> Result<HyperParameters> {
        let mut next = *params;

        if let Some(seed) = self.seed {
            let seed = u64::try_from(seed).map_err(|_| {
                ModelError::invalid_parameter("the random generator seed must be greater than zero")
            })?;
            next = next.with_seed(seed)?;
        }
        if let Some(test_size) = self.test_size {
            next = next.with_test_size(test_size)?;
        }
        if let Some(k_neighbors) = self.k_neighbors {
            let k_neighbors = usize::try_from(k_neighbors).map_err(|_| {
                ModelError::invalid_parameter("the number of neighbors must be greater than zero")
            })?;
            next = next.with_k_neighbors(k_neighbors)?;
        }
        if let Some(k_fold) = self.k_fold {
            let k_fold = usize::try_from(k_fold).map_err(|_| {
                ModelError::invalid_parameter("the number of folds (k-fold) must be zero or greater")
            })?;
            next = next.with_k_fold(k_fold);
        }

        Ok(next)
    }

    pub fn is_empty(&self) -> bool {
        self.seed.is_none()
            && self.test_size.is_none()
            && self.k_neighbors.is_none()
            && self.k_fold.is_none()
    }
}

/// Snapshot of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Fraction of test records classified correctly
    pub accuracy: f64,
    /// Mean k-fold accuracy over the full dataset; `None` when k_fold is 0
    pub crossval_accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub feature_count: usize,
    pub total_records: usize,
    pub train_records: usize,
    pub test_records: usize,
    /// Number of misclassified test records
    pub error_count: usize,
    /// Sorted class labels indexing the rows and columns of the confusion matrix
    pub class_labels: Vec<usize>,
    /// Rows are true classes, columns are predicted classes
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl EvaluationResult {
    /// Accuracy formatted as a percentage, e.g. `98.52%`
    pub fn accuracy_display(&self) -> String {
        format!("{:.2}%", self.accuracy * 100.0)
    }

    pub fn crossval_display(&self) -> String {
        match self.crossval_accuracy {
            Some(accuracy) => format!("{:.2}%", accuracy * 100.0),
            None => "not computed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = HyperParameters::default();
        assert_eq!(params.seed(), 0);
        assert_eq!(params.test_size(), 0.3);
        assert_eq!(params.k_neighbors(), 3);
        assert_eq!(params.k_fold(), 0);
    }

    #[test]
    fn test_seed_zero_rejected() {
        let params = HyperParameters::default();
        assert!(matches!(params.with_seed(0), Err(ModelError::InvalidParameter(_))));
        assert_eq!(params.with_seed(42).unwrap().seed(), 42);
    }

    #[test]
    fn test_test_size_bounds() {
        let params = HyperParameters::default();
        for bad in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            assert!(params.with_test_size(bad).is_err(), "{} should be rejected", bad);
        }
        assert_eq!(params.with_test_size(0.25).unwrap().test_size(), 0.25);
    }

    #[test]
    fn test_k_neighbors_leaves_other_fields() {
        let params = HyperParameters::default().with_seed(7).unwrap();
        for k in [1, 2, 5, 50] {
            let next = params.with_k_neighbors(k).unwrap();
            assert_eq!(next.k_neighbors(), k);
            assert_eq!(next.seed(), 7);
            assert_eq!(next.test_size(), params.test_size());
            assert_eq!(next.k_fold(), params.k_fold());
        }
        assert!(params.with_k_neighbors(0).is_err());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let params = HyperParameters::default();
        let update = ParamsUpdate {
            seed: Some(42),
            test_size: Some(0.2),
            k_neighbors: Some(-1),
            k_fold: Some(5),
        };
        assert!(update.apply(&params).is_err());
        assert_eq!(params, HyperParameters::default());
    }

    #[test]
    fn test_update_rejects_negative_fold() {
        let update = ParamsUpdate {
            k_fold: Some(-2),
            ..Default::default()
        };
        assert!(matches!(
            update.apply(&HyperParameters::default()),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_update_applies_all_fields() {
        let update = ParamsUpdate {
            seed: Some(42),
            test_size: Some(0.25),
            k_neighbors: Some(5),
            k_fold: Some(4),
        };
        let params = update.apply(&HyperParameters::default()).unwrap();
        assert_eq!(params.seed(), 42);
        assert_eq!(params.test_size(), 0.25);
        assert_eq!(params.k_neighbors(), 5);
        assert_eq!(params.k_fold(), 4);
        assert!(!update.is_empty());
        assert!(ParamsUpdate::default().is_empty());
    }
}
