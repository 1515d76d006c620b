//! Model lifecycle orchestration
//!
//! [`ClassificationModel`] owns the hyperparameters, the dataset, the latest
//! evaluation and the classifier, and moves through
//! `Unloaded -> Loaded -> Trained -> Evaluated`. Every failing operation
//! leaves the model exactly as it was.

mod input;

pub use input::PixelInput;

use crate::classifier::{Classifier, KnnClassifier, KnnState};
use crate::dataset::{DataSource, Dataset};
use crate::error::{ModelError, Result};
use crate::evaluation::{accuracy, confusion_matrix, cross_val_score, train_test_split, KFold};
use crate::models::{EvaluationResult, HyperParameters, ParamsUpdate};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Lifecycle position of a [`ClassificationModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loaded,
    Trained,
    Evaluated,
}

impl ModelState {
    /// True when the classifier can serve predictions
    pub fn can_predict(&self) -> bool {
        matches!(self, ModelState::Trained | ModelState::Evaluated)
    }
}

/// Everything a repository persists for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub classifier: KnnState,
    pub params: HyperParameters,
    pub result: Option<EvaluationResult>,
}

/// K-nearest-neighbors digit classifier with its training lifecycle
#[derive(Debug, Clone)]
pub struct ClassificationModel {
    params: HyperParameters,
    dataset: Dataset,
    result: Option<EvaluationResult>,
    classifier: KnnClassifier,
    state: ModelState,
}

impl Default for ClassificationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassificationModel {
    pub fn new() -> Self {
        let params = HyperParameters::default();
        Self {
            params,
            dataset: Dataset::default(),
            result: None,
            classifier: KnnClassifier::new(params.k_neighbors()),
            state: ModelState::Unloaded,
        }
    }

    /// Rebuild a model from a persisted bundle.
    ///
    /// The restored model has no dataset; it is `Evaluated` when the bundle
    /// carries a result and `Trained` otherwise.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        bundle.params.validate()?;
        let mut classifier = KnnClassifier::from_state(bundle.classifier)?;
        classifier.set_k_neighbors(bundle.params.k_neighbors());

        let state = if bundle.result.is_some() {
            ModelState::Evaluated
        } else {
            ModelState::Trained
        };

        Ok(Self {
            params: bundle.params,
            dataset: Dataset::default(),
            result: bundle.result,
            classifier,
            state,
        })
    }

    /// Package the fitted classifier, parameters and result for persistence
    pub fn bundle(&self) -> Result<ModelBundle> {
        let classifier = self.classifier.state().ok_or(ModelError::NotTrained)?;
        Ok(ModelBundle {
            classifier,
            params: self.params,
            result: self.result.clone(),
        })
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn params(&self) -> &HyperParameters {
        &self.params
    }

    pub fn result(&self) -> Option<&EvaluationResult> {
        self.result.as_ref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Neighbor count the live classifier will use
    pub fn classifier_k_neighbors(&self) -> usize {
        self.classifier.k_neighbors()
    }

    /// Fetch the dataset, discarding any partitions, fit and result
    pub fn load(&mut self, source: &dyn DataSource) -> Result<()> {
        let (features, labels) = source.load()?;
        if features.nrows() != labels.len() {
            return Err(ModelError::DataSource(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        self.dataset = Dataset::loaded(features, labels);
        self.classifier = KnnClassifier::new(self.params.k_neighbors());
        self.result = None;
        self.state = ModelState::Loaded;
        Ok(())
    }

    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.params = self.params.with_seed(seed)?;
        Ok(())
    }

    pub fn set_test_size(&mut self, test_size: f64) -> Result<()> {
        self.params = self.params.with_test_size(test_size)?;
        Ok(())
    }

    /// Change the neighbor count, updating the live classifier as well
    pub fn set_k_neighbors(&mut self, k_neighbors: usize) -> Result<()> {
        self.params = self.params.with_k_neighbors(k_neighbors)?;
        self.classifier.set_k_neighbors(k_neighbors);
        Ok(())
    }

    pub fn set_k_fold(&mut self, k_fold: usize) {
        self.params = self.params.with_k_fold(k_fold);
    }

    /// Apply a partial update; nothing changes if any field is invalid
    pub fn configure(&mut self, update: &ParamsUpdate) -> Result<()> {
        let params = update.apply(&self.params)?;
        self.params = params;
        self.classifier.set_k_neighbors(params.k_neighbors());
        Ok(())
    }

    /// Split the loaded dataset and fit the classifier on the training part
    pub fn train(&mut self) -> Result<()> {
        let (features, labels) = match (self.dataset.features(), self.dataset.labels()) {
            (Some(features), Some(labels)) => (features, labels),
            _ => return Err(ModelError::NotLoaded),
        };

        let split = train_test_split(
            features,
            labels,
            self.params.test_size(),
            self.params.seed(),
        )?;

        let mut classifier = KnnClassifier::new(self.params.k_neighbors());
        classifier.fit(&split.train_features, &split.train_labels)?;

        self.dataset = self.dataset.with_split(split);
        self.classifier = classifier;
        self.result = None;
        self.state = ModelState::Trained;
        Ok(())
    }

    /// Score the fitted classifier on the test partition
    pub fn evaluate(&mut self) -> Result<&EvaluationResult> {
        let (test_features, test_labels) =
            match (self.dataset.test_features(), self.dataset.test_labels()) {
                (Some(features), Some(labels)) if self.classifier.is_fitted() => {
                    (features, labels)
                }
                _ => return Err(ModelError::NotTrained),
            };

        let predicted = self.classifier.predict(test_features)?;
        let truth = test_labels.to_vec();
        let error_count = truth
            .iter()
            .zip(&predicted)
            .filter(|(t, p)| t != p)
            .count();
        let (class_labels, matrix) = confusion_matrix(&truth, &predicted);

        let crossval_accuracy = match self.params.k_fold() {
            0 => None,
            k_fold => {
                let features = self.dataset.features().ok_or(ModelError::NotLoaded)?;
                let labels = self.dataset.labels().ok_or(ModelError::NotLoaded)?;
                let kfold = KFold::new(k_fold, self.params.seed())?;
                let scores =
                    cross_val_score(self.classifier.k_neighbors(), features, labels, &kfold)?;
                Some(scores.iter().sum::<f64>() / scores.len() as f64)
            }
        };

        let result = EvaluationResult {
            accuracy: accuracy(&truth, &predicted),
            crossval_accuracy,
            timestamp: Utc::now(),
            feature_count: self.dataset.feature_count(),
            total_records: self.dataset.total_records(),
            train_records: self.dataset.train_labels().map_or(0, |l| l.len()),
            test_records: truth.len(),
            error_count,
            class_labels,
            confusion_matrix: matrix,
        };

        self.state = ModelState::Evaluated;
        Ok(&*self.result.insert(result))
    }

    /// Predict the class of exactly one sample.
    ///
    /// Batches are accepted as input shapes, but a batch that does not hold
    /// exactly one sample is rejected once predicted.
    pub fn predict(&self, input: &PixelInput) -> Result<usize> {
        let predictions = self.predict_batch(input)?;
        match predictions.as_slice() {
            [label] => Ok(*label),
            _ => Err(ModelError::invalid_shape(format!(
                "expected a single 64-length pixel vector, got {} samples",
                predictions.len()
            ))),
        }
    }

    /// Predict the class of every sample in `input`
    pub fn predict_batch(&self, input: &PixelInput) -> Result<Vec<usize>> {
        if !self.state.can_predict() || !self.classifier.is_fitted() {
            return Err(ModelError::NotTrained);
        }
        let batch = input.to_batch()?;
        self.classifier.predict(&batch)
    }
}
