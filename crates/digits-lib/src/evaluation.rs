//! Data partitioning and scoring helpers
//!
//! Provides:
//! - Seeded train/test splitting
//! - Shuffled K-Fold index generation and cross-validation
//! - Accuracy and confusion matrix computation

use crate::classifier::{Classifier, KnnClassifier};
use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

/// Train and test partitions produced by [`train_test_split`]
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train_features: Array2<f64>,
    pub train_labels: Array1<usize>,
    pub test_features: Array2<f64>,
    pub test_labels: Array1<usize>,
}

/// Shuffle `0..n_samples` deterministically from `seed`
pub fn shuffled_indices(n_samples: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

/// Split records into train/test partitions.
///
/// The test partition holds `ceil(test_size * n)` records; both partitions
/// must end up non-empty. The same seed and test size always yield the same
/// partition.
pub fn train_test_split(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    test_size: f64,
    seed: u64,
) -> Result<Split> {
    let n_samples = features.nrows();
    if labels.len() != n_samples {
        return Err(ModelError::invalid_shape(format!(
            "{} feature rows but {} labels",
            n_samples,
            labels.len()
        )));
    }

    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(ModelError::invalid_parameter(format!(
            "test size {} leaves an empty partition for {} records",
            test_size, n_samples
        )));
    }

    let indices = shuffled_indices(n_samples, seed);
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(Split {
        train_features: features.select(Axis(0), train_idx),
        train_labels: labels.select(Axis(0), train_idx),
        test_features: features.select(Axis(0), test_idx),
        test_labels: labels.select(Axis(0), test_idx),
    })
}

/// Shuffled K-Fold cross-validator
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    /// Create a K-Fold splitter; at least two folds are required
    pub fn new(n_splits: usize, seed: u64) -> Result<Self> {
        if n_splits < 2 {
            return Err(ModelError::invalid_parameter(format!(
                "k-fold cross-validation needs at least 2 folds, got {}",
                n_splits
            )));
        }
        Ok(Self { n_splits, seed })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate `(train_indices, test_indices)` for each fold.
    ///
    /// The remainder of `n_samples / n_splits` is spread over the first folds.
    pub fn split(&self, n_samples: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits > n_samples {
            return Err(ModelError::invalid_parameter(format!(
                "cannot make {} folds from {} records",
                self.n_splits, n_samples
            )));
        }

        let indices = shuffled_indices(n_samples, self.seed);
        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = if i < remainder { fold_size + 1 } else { fold_size };
            let end = start + size;

            let test = indices[start..end].to_vec();
            let mut train = Vec::with_capacity(n_samples - size);
            train.extend_from_slice(&indices[..start]);
            train.extend_from_slice(&indices[end..]);

            folds.push((train, test));
            start = end;
        }

        Ok(folds)
    }
}

/// Score a fresh `k`-neighbor classifier on every fold
pub fn cross_val_score(
    k_neighbors: usize,
    features: &Array2<f64>,
    labels: &Array1<usize>,
    kfold: &KFold,
) -> Result<Vec<f64>> {
    let folds = kfold.split(features.nrows())?;
    let mut scores = Vec::with_capacity(folds.len());

    for (train_idx, test_idx) in folds {
        let mut fold_model = KnnClassifier::new(k_neighbors);
        fold_model.fit(
            &features.select(Axis(0), &train_idx),
            &labels.select(Axis(0), &train_idx),
        )?;
        let score = fold_model.score(
            &features.select(Axis(0), &test_idx),
            &labels.select(Axis(0), &test_idx),
        )?;
        scores.push(score);
    }

    Ok(scores)
}

/// Fraction of exact matches; 0 for empty input
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let matches = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    matches as f64 / truth.len() as f64
}

/// Confusion matrix over the labels present in either input.
///
/// Returns the sorted labels together with the matrix; `matrix[i][j]` counts
/// records whose true label is `labels[i]` and predicted label is `labels[j]`.
pub fn confusion_matrix(truth: &[usize], predicted: &[usize]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let labels: Vec<usize> = truth
        .iter()
        .chain(predicted)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let position = |label: usize| labels.binary_search(&label).unwrap_or_default();

    let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
    for (&t, &p) in truth.iter().zip(predicted) {
        matrix[position(t)][position(p)] += 1;
    }

    (labels, matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data(n: usize) -> (Array2<f64>, Array1<usize>) {
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let labels = Array1::from_shape_fn(n, |i| i % 2);
        (features, labels)
    }

    #[test]
    fn test_split_sizes() {
        let (x, y) = toy_data(10);
        let split = train_test_split(&x, &y, 0.25, 42).unwrap();
        // ceil(2.5) = 3 held out
        assert_eq!(split.test_features.nrows(), 3);
        assert_eq!(split.train_features.nrows(), 7);
        assert_eq!(split.train_labels.len(), 7);
        assert_eq!(split.test_labels.len(), 3);

        // a fractional share always rounds the held-out count up
        let split = train_test_split(&x, &y, 0.21, 42).unwrap();
        assert_eq!(split.test_features.nrows(), 3);
        assert_eq!(split.train_features.nrows(), 7);
    }

    #[test]
    fn test_split_is_deterministic() {
        let (x, y) = toy_data(50);
        let a = train_test_split(&x, &y, 0.3, 7).unwrap();
        let b = train_test_split(&x, &y, 0.3, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_partitions_are_disjoint() {
        let (x, y) = toy_data(20);
        let split = train_test_split(&x, &y, 0.3, 1).unwrap();
        let mut seen: Vec<f64> = split
            .train_features
            .column(0)
            .iter()
            .chain(split.test_features.column(0).iter())
            .copied()
            .collect();
        seen.sort_by(|a, b| a.total_cmp(b));
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_split_rejects_empty_partition() {
        let (x, y) = toy_data(1);
        assert!(matches!(
            train_test_split(&x, &y, 0.5, 0),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kfold_covers_every_index_once() {
        let kfold = KFold::new(3, 42).unwrap();
        let folds = kfold.split(10).unwrap();
        assert_eq!(folds.len(), 3);

        let mut all_test: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..10).collect::<Vec<_>>());

        // remainder goes to the first fold
        assert_eq!(folds[0].1.len(), 4);
        assert_eq!(folds[1].1.len(), 3);
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 10);
            assert!(test.iter().all(|i| !train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_rejects_too_few_folds() {
        assert!(KFold::new(1, 0).is_err());
        assert!(KFold::new(5, 0).unwrap().split(3).is_err());
    }

    #[test]
    fn test_cross_val_scores_in_range() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [5.0, 5.0], [5.1, 5.0], [5.0, 5.1]];
        let y = array![0, 0, 0, 1, 1, 1];
        let scores = cross_val_score(1, &x, &y, &KFold::new(3, 3).unwrap()).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 3], &[0, 1, 0, 3]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_confusion_matrix_sums() {
        let truth = [0, 0, 1, 1, 2, 2];
        let pred = [0, 1, 1, 1, 2, 0];
        let (labels, cm) = confusion_matrix(&truth, &pred);

        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(cm, vec![vec![1, 1, 0], vec![0, 2, 0], vec![1, 0, 1]]);
        let total: usize = cm.iter().flatten().sum();
        assert_eq!(total, truth.len());
    }

    #[test]
    fn test_confusion_matrix_includes_predicted_only_labels() {
        let (labels, cm) = confusion_matrix(&[3, 3], &[3, 7]);
        assert_eq!(labels, vec![3, 7]);
        assert_eq!(cm, vec![vec![1, 1], vec![0, 0]]);
    }
}
