//! Brute-force k-nearest-neighbors classifier
//!
//! Stores the training rows at fit time and defers all work to prediction,
//! where each query row is labelled by a majority vote among its `k` closest
//! training rows under Euclidean distance.

use super::Classifier;
use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Serializable fitted state of a [`KnnClassifier`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnState {
    pub k_neighbors: usize,
    pub features: Array2<f64>,
    pub labels: Array1<usize>,
}

/// K-nearest-neighbors classifier with a mutable neighbor count
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k_neighbors: usize,
    features: Option<Array2<f64>>,
    labels: Option<Array1<usize>>,
}

impl KnnClassifier {
    pub fn new(k_neighbors: usize) -> Self {
        Self {
            k_neighbors,
            features: None,
            labels: None,
        }
    }

    /// Rebuild a fitted classifier from persisted state
    pub fn from_state(state: KnnState) -> Result<Self> {
        let mut knn = Self::new(state.k_neighbors);
        knn.fit(&state.features, &state.labels)?;
        Ok(knn)
    }

    /// Snapshot the fitted state; `None` before the first fit
    pub fn state(&self) -> Option<KnnState> {
        match (&self.features, &self.labels) {
            (Some(features), Some(labels)) => Some(KnnState {
                k_neighbors: self.k_neighbors,
                features: features.clone(),
                labels: labels.clone(),
            }),
            _ => None,
        }
    }

    /// Number of stored training rows
    pub fn n_samples(&self) -> usize {
        self.labels.as_ref().map_or(0, |labels| labels.len())
    }

    fn vote(&self, query: ArrayView1<f64>, features: &Array2<f64>, labels: &Array1<usize>) -> usize {
        // Squared distances preserve the neighbor ordering
        let mut distances: Vec<(f64, usize)> = features
            .rows()
            .into_iter()
            .zip(labels.iter())
            .map(|(row, &label)| {
                let dist = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
                (dist, label)
            })
            .collect();

        // Stable sort keeps training order among equal distances
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));
        let nearest = &distances[..self.k_neighbors];

        // (label, votes, rank of its closest neighbor)
        let mut tally: Vec<(usize, usize, usize)> = Vec::new();
        for (rank, &(_, label)) in nearest.iter().enumerate() {
            match tally.iter_mut().find(|(l, _, _)| *l == label) {
                Some(entry) => entry.1 += 1,
                None => tally.push((label, 1, rank)),
            }
        }

        tally
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(label, _, _)| label)
            .unwrap_or_default()
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<usize>) -> Result<()> {
        let n_samples = features.nrows();
        if n_samples == 0 {
            return Err(ModelError::invalid_parameter("cannot fit with zero samples"));
        }
        if labels.len() != n_samples {
            return Err(ModelError::invalid_shape(format!(
                "{} feature rows but {} labels",
                n_samples,
                labels.len()
            )));
        }
        if self.k_neighbors > n_samples {
            return Err(ModelError::invalid_parameter(format!(
                "the number of neighbors ({}) exceeds the {} training records",
                self.k_neighbors, n_samples
            )));
        }

        self.features = Some(features.clone());
        self.labels = Some(labels.clone());
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let (train_features, train_labels) = match (&self.features, &self.labels) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(ModelError::NotTrained),
        };

        if features.ncols() != train_features.ncols() {
            return Err(ModelError::invalid_shape(format!(
                "expected {} features per sample, got {}",
                train_features.ncols(),
                features.ncols()
            )));
        }
        if self.k_neighbors == 0 || self.k_neighbors > train_labels.len() {
            return Err(ModelError::invalid_parameter(format!(
                "the number of neighbors ({}) must be between 1 and the {} training records",
                self.k_neighbors,
                train_labels.len()
            )));
        }

        Ok(features
            .rows()
            .into_iter()
            .map(|row| self.vote(row, train_features, train_labels))
            .collect())
    }

    fn set_k_neighbors(&mut self, k_neighbors: usize) {
        self.k_neighbors = k_neighbors;
    }

    fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    fn is_fitted(&self) -> bool {
        self.features.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [5.0, 5.0],
            [5.0, 6.0],
            [6.0, 5.0]
        ];
        let y = array![0, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let knn = KnnClassifier::new(3);
        assert!(matches!(
            knn.predict(&array![[0.0, 0.0]]),
            Err(ModelError::NotTrained)
        ));
        assert!(!knn.is_fitted());
        assert!(knn.state().is_none());
    }

    #[test]
    fn test_majority_vote() {
        let (x, y) = two_clusters();
        let mut knn = KnnClassifier::new(3);
        knn.fit(&x, &y).unwrap();

        let predictions = knn.predict(&array![[0.5, 0.5], [5.5, 5.5]]).unwrap();
        assert_eq!(predictions, vec![0, 1]);
        assert_eq!(knn.score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_tie_goes_to_nearest_class() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let y = array![0, 0, 1, 1];
        let mut knn = KnnClassifier::new(2);
        knn.fit(&x, &y).unwrap();

        // neighbors are 1.0 (class 0) and 10.0 (class 1); 6.0 is closer to 10.0
        assert_eq!(knn.predict(&array![[6.0]]).unwrap(), vec![1]);
    }

    #[test]
    fn test_three_way_tie_is_stable() {
        let x = array![[1.0], [-2.0], [3.0]];
        let y = array![7, 4, 2];
        let mut knn = KnnClassifier::new(3);
        knn.fit(&x, &y).unwrap();

        for _ in 0..50 {
            assert_eq!(knn.predict(&array![[0.0]]).unwrap(), vec![7]);
        }
    }

    #[test]
    fn test_k_change_applies_without_refit() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [3.5]];
        let y = array![0, 1, 1, 0, 0];
        let mut knn = KnnClassifier::new(1);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[0.9]]).unwrap(), vec![1]);

        knn.set_k_neighbors(5);
        assert_eq!(knn.k_neighbors(), 5);
        assert_eq!(knn.predict(&array![[0.9]]).unwrap(), vec![0]);

        knn.set_k_neighbors(6);
        assert!(knn.predict(&array![[0.9]]).is_err());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut knn = KnnClassifier::new(10);
        let (x, y) = two_clusters();
        assert!(matches!(knn.fit(&x, &y), Err(ModelError::InvalidParameter(_))));

        let mut knn = KnnClassifier::new(1);
        assert!(matches!(
            knn.fit(&x, &array![0, 1]),
            Err(ModelError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_feature_width_mismatch() {
        let (x, y) = two_clusters();
        let mut knn = KnnClassifier::new(1);
        knn.fit(&x, &y).unwrap();
        assert!(matches!(
            knn.predict(&array![[1.0, 2.0, 3.0]]),
            Err(ModelError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_state_round_trip() {
        let (x, y) = two_clusters();
        let mut knn = KnnClassifier::new(3);
        knn.fit(&x, &y).unwrap();

        let restored = KnnClassifier::from_state(knn.state().unwrap()).unwrap();
        assert_eq!(restored.n_samples(), 6);
        assert_eq!(
            restored.predict(&array![[0.2, 0.1]]).unwrap(),
            knn.predict(&array![[0.2, 0.1]]).unwrap()
        );
    }
}
