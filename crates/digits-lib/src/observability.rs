//! Observability infrastructure for the digit classifier shells
//!
//! Provides:
//! - Prometheus metrics (train/predict counts and latency, errors, last accuracy)
//! - Structured logging with tracing

use crate::error::ModelError;
use crate::models::{EvaluationResult, HyperParameters};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Gauge,
    Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for predict latency (in seconds)
const PREDICT_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25];

/// Histogram buckets for train latency (in seconds)
const TRAIN_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    train_requests: IntCounter,
    predict_requests: IntCounter,
    command_errors: IntCounterVec,
    train_latency_seconds: Histogram,
    predict_latency_seconds: Histogram,
    last_accuracy: Gauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            train_requests: register_int_counter!(
                "digits_train_requests_total",
                "Total number of training runs"
            )
            .expect("Failed to register train_requests"),

            predict_requests: register_int_counter!(
                "digits_predict_requests_total",
                "Total number of prediction requests"
            )
            .expect("Failed to register predict_requests"),

            command_errors: register_int_counter_vec!(
                "digits_command_errors_total",
                "Failed commands by command name and error kind",
                &["command", "kind"]
            )
            .expect("Failed to register command_errors"),

            train_latency_seconds: register_histogram!(
                "digits_train_latency_seconds",
                "Time spent loading, training, evaluating and storing a model",
                TRAIN_BUCKETS.to_vec()
            )
            .expect("Failed to register train_latency_seconds"),

            predict_latency_seconds: register_histogram!(
                "digits_predict_latency_seconds",
                "Time spent restoring a model and classifying a sample",
                PREDICT_BUCKETS.to_vec()
            )
            .expect("Failed to register predict_latency_seconds"),

            last_accuracy: register_gauge!(
                "digits_last_accuracy",
                "Hold-out accuracy of the most recently trained model"
            )
            .expect("Failed to register last_accuracy"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    /// Record a completed training run
    pub fn observe_train(&self, elapsed: Duration, accuracy: Option<f64>) {
        let inner = self.inner();
        inner.train_requests.inc();
        inner.train_latency_seconds.observe(elapsed.as_secs_f64());
        if let Some(accuracy) = accuracy {
            inner.last_accuracy.set(accuracy);
        }
    }

    /// Record a prediction request
    pub fn observe_predict(&self, elapsed: Duration) {
        let inner = self.inner();
        inner.predict_requests.inc();
        inner.predict_latency_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn inc_errors(&self, command: &str, kind: &str) {
        self.inner()
            .command_errors
            .with_label_values(&[command, kind])
            .inc();
    }

    pub fn train_requests(&self) -> u64 {
        self.inner().train_requests.get()
    }

    pub fn predict_requests(&self) -> u64 {
        self.inner().predict_requests.get()
    }
}

/// Structured logger for classifier events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Log a completed train + evaluate run
    pub fn log_training(&self, result: &EvaluationResult, elapsed: Duration) {
        info!(
            event = "training_completed",
            component = %self.component,
            accuracy = result.accuracy,
            crossval_accuracy = ?result.crossval_accuracy,
            train_records = result.train_records,
            test_records = result.test_records,
            error_count = result.error_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Model trained and evaluated"
        );
    }

    pub fn log_prediction(&self, label: usize, elapsed: Duration) {
        info!(
            event = "prediction_served",
            component = %self.component,
            label = label,
            elapsed_us = elapsed.as_micros() as u64,
            "Digit predicted"
        );
    }

    pub fn log_model_stored(&self, params: &HyperParameters) {
        info!(
            event = "model_stored",
            component = %self.component,
            seed = params.seed(),
            test_size = params.test_size(),
            k_neighbors = params.k_neighbors(),
            k_fold = params.k_fold(),
            "Model bundle persisted"
        );
    }

    /// Log a failed command
    pub fn log_failure(&self, command: &str, err: &ModelError) {
        warn!(
            event = "command_failed",
            component = %self.component,
            command = %command,
            error = %err,
            "Command failed"
        );
    }

    pub fn log_startup(&self, version: &str, address: &str) {
        info!(
            event = "service_started",
            component = %self.component,
            version = %version,
            address = %address,
            "Digit classifier service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            component = %self.component,
            reason = %reason,
            "Digit classifier service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_observations() {
        let metrics = ServiceMetrics::new();
        let trained = metrics.train_requests();
        let predicted = metrics.predict_requests();

        metrics.observe_train(Duration::from_millis(120), Some(0.97));
        metrics.observe_predict(Duration::from_micros(300));
        metrics.inc_errors("predict", "invalid_shape");

        // Other tests in this process share the global registry
        assert!(metrics.train_requests() > trained);
        assert!(metrics.predict_requests() > predicted);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("cli");
        assert_eq!(logger.component(), "cli");
    }
}
