//! Nearest-neighbor estimator

mod knn;

pub use knn::{KnnClassifier, KnnState};

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Contract between the model orchestrator and a trainable estimator
pub trait Classifier: Send + Sync {
    /// Learn from `features` (records x features) and their `labels`
    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<usize>) -> Result<()>;

    /// Predict one class label per row of `features`
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Fraction of rows whose prediction matches `labels`
    fn score(&self, features: &Array2<f64>, labels: &Array1<usize>) -> Result<f64> {
        let predicted = self.predict(features)?;
        Ok(crate::evaluation::accuracy(&labels.to_vec(), &predicted))
    }

    /// Change the neighbor count used by subsequent predictions
    fn set_k_neighbors(&mut self, k_neighbors: usize);

    fn k_neighbors(&self) -> usize;

    fn is_fitted(&self) -> bool;
}
