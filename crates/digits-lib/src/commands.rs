//! Shell-facing command and query wrappers
//!
//! Shells never drive [`ClassificationModel`] directly. They run a command
//! (train, predict) or a query (stored result, stored parameters) and render
//! the [`CommandResult`] it returns. Commands can be registered by name in a
//! [`CommandRegistry`] and dispatched with JSON input.

use crate::dataset::DataSource;
use crate::error::{ModelError, PersistenceError, Result};
use crate::model::{ClassificationModel, PixelInput};
use crate::models::{EvaluationResult, HyperParameters, ParamsUpdate};
use crate::observability::StructuredLogger;
use crate::repository::Repository;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Registered command names
pub mod names {
    pub const TRAIN: &str = "train";
    pub const PREDICT: &str = "predict";
    pub const RESULT: &str = "result";
    pub const PARAMS: &str = "params";
}

/// Failure category carried by an unsuccessful [`CommandResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParameter,
    InvalidShape,
    InvalidInput,
    NotLoaded,
    NotTrained,
    NotFound,
    Persistence,
    DataSource,
    UnknownCommand,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::InvalidShape => "invalid_shape",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotLoaded => "not_loaded",
            ErrorKind::NotTrained => "not_trained",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
            ErrorKind::DataSource => "data_source",
            ErrorKind::UnknownCommand => "unknown_command",
            ErrorKind::Internal => "internal",
        }
    }
}

impl From<&ModelError> for ErrorKind {
    fn from(err: &ModelError) -> Self {
        match err {
            ModelError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            ModelError::InvalidShape(_) => ErrorKind::InvalidShape,
            ModelError::NotLoaded => ErrorKind::NotLoaded,
            ModelError::NotTrained => ErrorKind::NotTrained,
            ModelError::Persistence(PersistenceError::Missing(_)) => ErrorKind::NotFound,
            ModelError::Persistence(_) => ErrorKind::Persistence,
            ModelError::DataSource(_) => ErrorKind::DataSource,
        }
    }
}

/// Outcome of a command or query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct CommandResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T> CommandResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error_kind: Some(kind),
        }
    }

    pub fn from_error(err: &ModelError) -> Self {
        Self::failure(ErrorKind::from(err), err.to_string())
    }

    fn from_outcome(outcome: Result<T>, message: &str) -> Self {
        match outcome {
            Ok(data) => Self::ok(message, data),
            Err(err) => Self::from_error(&err),
        }
    }
}

impl<T: Serialize> CommandResult<T> {
    /// Erase the payload type for dispatch through a [`CommandRegistry`]
    pub fn into_json(self) -> CommandResult<Value> {
        let data = match self.data.map(serde_json::to_value).transpose() {
            Ok(data) => data,
            Err(e) => {
                return CommandResult::failure(
                    ErrorKind::Internal,
                    format!("failed to encode response: {}", e),
                )
            }
        };
        CommandResult {
            success: self.success,
            message: self.message,
            data,
            error_kind: self.error_kind,
        }
    }
}

/// A named operation invoked with JSON input
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn execute_json(&self, input: Value) -> CommandResult<Value>;
}

fn parse_input<T: DeserializeOwned>(input: Value) -> std::result::Result<T, CommandResult<Value>> {
    serde_json::from_value(input).map_err(|e| {
        CommandResult::failure(ErrorKind::InvalidInput, format!("invalid input: {}", e))
    })
}

/// Training request; absent fields keep their defaults
pub type TrainInput = ParamsUpdate;

/// Train a fresh model with the given parameters, evaluate it and persist it
pub struct TrainCommand {
    source: Arc<dyn DataSource>,
    repository: Arc<dyn Repository>,
    logger: StructuredLogger,
}

impl TrainCommand {
    pub fn new(
        source: Arc<dyn DataSource>,
        repository: Arc<dyn Repository>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            repository,
            logger,
        }
    }

    pub fn execute(&self, input: &TrainInput) -> CommandResult<EvaluationResult> {
        let start = Instant::now();
        let outcome = self.run(input);
        match &outcome {
            Ok(result) => self.logger.log_training(result, start.elapsed()),
            Err(err) => self.logger.log_failure(names::TRAIN, err),
        }
        CommandResult::from_outcome(outcome, "Model trained and evaluated successfully")
    }

    fn run(&self, input: &TrainInput) -> Result<EvaluationResult> {
        let mut model = ClassificationModel::new();
        model.configure(input)?;
        model.load(self.source.as_ref())?;
        model.train()?;
        let result = model.evaluate()?.clone();
        self.repository.store(&model.bundle()?)?;
        self.logger.log_model_stored(model.params());
        Ok(result)
    }
}

impl Command for TrainCommand {
    fn name(&self) -> &str {
        names::TRAIN
    }

    fn execute_json(&self, input: Value) -> CommandResult<Value> {
        // An empty body trains with default parameters
        let input = if input.is_null() {
            Value::Object(Default::default())
        } else {
            input
        };
        match parse_input::<TrainInput>(input) {
            Ok(update) => self.execute(&update).into_json(),
            Err(failure) => failure,
        }
    }
}

/// Pixels submitted for prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictInput {
    pub pixels: PixelInput,
}

/// A predicted digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub label: usize,
}

/// Restore the persisted model and classify one sample
pub struct PredictCommand {
    repository: Arc<dyn Repository>,
    logger: StructuredLogger,
}

impl PredictCommand {
    pub fn new(repository: Arc<dyn Repository>, logger: StructuredLogger) -> Self {
        Self { repository, logger }
    }

    pub fn execute(&self, input: &PredictInput) -> CommandResult<PredictionOutput> {
        let start = Instant::now();
        let outcome = self.run(input);
        match &outcome {
            Ok(output) => self.logger.log_prediction(output.label, start.elapsed()),
            Err(err) => self.logger.log_failure(names::PREDICT, err),
        }
        CommandResult::from_outcome(outcome, "Prediction completed")
    }

    fn run(&self, input: &PredictInput) -> Result<PredictionOutput> {
        let model = ClassificationModel::from_bundle(self.repository.restore()?)?;
        let label = model.predict(&input.pixels)?;
        Ok(PredictionOutput { label })
    }
}

impl Command for PredictCommand {
    fn name(&self) -> &str {
        names::PREDICT
    }

    fn execute_json(&self, input: Value) -> CommandResult<Value> {
        match parse_input::<PredictInput>(input) {
            Ok(input) => self.execute(&input).into_json(),
            Err(failure) => failure,
        }
    }
}

/// Report the evaluation stored with the persisted model
pub struct ResultQuery {
    repository: Arc<dyn Repository>,
}

impl ResultQuery {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self) -> CommandResult<EvaluationResult> {
        let outcome = self
            .repository
            .restore()
            .and_then(|bundle| bundle.result.ok_or(ModelError::NotTrained));
        CommandResult::from_outcome(outcome, "Stored evaluation result")
    }
}

impl Command for ResultQuery {
    fn name(&self) -> &str {
        names::RESULT
    }

    fn execute_json(&self, _input: Value) -> CommandResult<Value> {
        self.execute().into_json()
    }
}

/// Report the hyperparameters stored with the persisted model
pub struct ParamsQuery {
    repository: Arc<dyn Repository>,
}

impl ParamsQuery {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self) -> CommandResult<HyperParameters> {
        let outcome = self.repository.restore().map(|bundle| bundle.params);
        CommandResult::from_outcome(outcome, "Stored hyperparameters")
    }
}

impl Command for ParamsQuery {
    fn name(&self) -> &str {
        names::PARAMS
    }

    fn execute_json(&self, _input: Value) -> CommandResult<Value> {
        self.execute().into_json()
    }
}

/// Name-indexed set of commands and queries
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the train/predict commands and result/params queries
    pub fn standard(
        source: Arc<dyn DataSource>,
        repository: Arc<dyn Repository>,
        logger: StructuredLogger,
    ) -> Self {
        let mut registry = Self::new();
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(TrainCommand::new(source, repository.clone(), logger.clone())),
            Arc::new(PredictCommand::new(repository.clone(), logger)),
            Arc::new(ResultQuery::new(repository.clone())),
            Arc::new(ParamsQuery::new(repository)),
        ];
        for command in commands {
            registry.commands.insert(command.name().to_string(), command);
        }
        registry
    }

    /// Add a command, replacing any command registered under the same name
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<()> {
        if command.name().trim().is_empty() {
            return Err(ModelError::invalid_parameter("command name cannot be empty"));
        }
        self.commands.insert(command.name().to_string(), command);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the command registered as `name`
    pub fn dispatch(&self, name: &str, input: Value) -> CommandResult<Value> {
        match self.commands.get(name) {
            Some(command) => command.execute_json(input),
            None => CommandResult::failure(
                ErrorKind::UnknownCommand,
                format!("command '{}' not found", name),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{SyntheticDigits, PIXEL_COUNT};
    use crate::repository::MemoryRepository;
    use serde_json::json;

    fn registry() -> (CommandRegistry, Arc<MemoryRepository>) {
        let repository = Arc::new(MemoryRepository::new());
        let registry = CommandRegistry::standard(
            Arc::new(SyntheticDigits::new(150, 5)),
            repository.clone(),
            StructuredLogger::new("test"),
        );
        (registry, repository)
    }

    #[test]
    fn test_train_then_predict() {
        let (registry, repository) = registry();

        let trained = registry.dispatch(
            names::TRAIN,
            json!({"seed": 42, "test_size": 0.3, "k_neighbors": 3, "k_fold": 0}),
        );
        assert!(trained.success, "{}", trained.message);
        let data = trained.data.unwrap();
        assert_eq!(data["total_records"], 150);
        assert!(data["crossval_accuracy"].is_null());
        assert!(repository.exists());

        let predicted = registry.dispatch(names::PREDICT, json!({"pixels": vec![0.0; PIXEL_COUNT]}));
        assert!(predicted.success, "{}", predicted.message);
        assert!(predicted.data.unwrap()["label"].as_u64().unwrap() < 10);
    }

    #[test]
    fn test_train_with_empty_body_uses_defaults() {
        let (registry, repository) = registry();
        let trained = registry.dispatch(names::TRAIN, Value::Null);
        assert!(trained.success, "{}", trained.message);

        let params = ParamsQuery::new(repository).execute();
        assert_eq!(params.data.unwrap(), HyperParameters::default());
    }

    #[test]
    fn test_invalid_seed_is_reported() {
        let (registry, repository) = registry();
        let trained = registry.dispatch(names::TRAIN, json!({"seed": 0}));
        assert!(!trained.success);
        assert_eq!(trained.error_kind, Some(ErrorKind::InvalidParameter));
        assert!(!repository.exists());
    }

    #[test]
    fn test_predict_without_model() {
        let (registry, _) = registry();
        let predicted = registry.dispatch(names::PREDICT, json!({"pixels": vec![0.0; PIXEL_COUNT]}));
        assert!(!predicted.success);
        assert_eq!(predicted.error_kind, Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_predict_wrong_length() {
        let (registry, _) = registry();
        assert!(registry.dispatch(names::TRAIN, json!({"seed": 1})).success);

        let predicted = registry.dispatch(names::PREDICT, json!({"pixels": vec![0.0; 63]}));
        assert!(!predicted.success);
        assert_eq!(predicted.error_kind, Some(ErrorKind::InvalidShape));
    }

    #[test]
    fn test_malformed_input() {
        let (registry, _) = registry();
        let predicted = registry.dispatch(names::PREDICT, json!({"pixels": "zeros"}));
        assert_eq!(predicted.error_kind, Some(ErrorKind::InvalidInput));

        let trained = registry.dispatch(names::TRAIN, json!({"seed": "many"}));
        assert_eq!(trained.error_kind, Some(ErrorKind::InvalidInput));
    }

    #[test]
    fn test_result_query() {
        let (registry, repository) = registry();
        let missing = ResultQuery::new(repository.clone()).execute();
        assert_eq!(missing.error_kind, Some(ErrorKind::NotFound));

        registry.dispatch(names::TRAIN, json!({"seed": 3, "k_fold": 3}));
        let stored = ResultQuery::new(repository).execute();
        assert!(stored.success);
        assert!(stored.data.unwrap().crossval_accuracy.is_some());
    }

    #[test]
    fn test_unknown_command() {
        let (registry, _) = registry();
        let outcome = registry.dispatch("evaluate", Value::Null);
        assert_eq!(outcome.error_kind, Some(ErrorKind::UnknownCommand));
        assert_eq!(registry.names(), vec!["params", "predict", "result", "train"]);
        assert_eq!(ErrorKind::UnknownCommand.as_str(), "unknown_command");
    }

    #[test]
    fn test_register_rejects_empty_name() {
        struct Nameless;
        impl Command for Nameless {
            fn name(&self) -> &str {
                " "
            }
            fn execute_json(&self, _input: Value) -> CommandResult<Value> {
                CommandResult::ok("noop", Value::Null)
            }
        }

        let mut registry = CommandRegistry::new();
        assert!(registry.register(Arc::new(Nameless)).is_err());
        assert!(!registry.contains(" "));
    }
}
