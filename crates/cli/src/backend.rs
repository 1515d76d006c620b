//! Local or remote execution of classifier commands

use crate::client::ApiClient;
use anyhow::Result;
use digits_lib::{
    CommandResult, CsvDigitsSource, DataSource, EvaluationResult, FileRepository,
    HyperParameters, ParamsQuery, PredictCommand, PredictInput, PredictionOutput, ResultQuery,
    StructuredLogger, TrainCommand, TrainInput, UnconfiguredSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Data source for local runs; loading fails until a dataset CSV is given
pub fn data_source(dataset: Option<&Path>) -> Arc<dyn DataSource> {
    match dataset {
        Some(path) => Arc::new(CsvDigitsSource::new(path)),
        None => Arc::new(UnconfiguredSource::new(
            "pass --dataset or set DIGITS_DATASET_PATH to a headerless digits.csv",
        )),
    }
}

/// Commands running in this process against a local model directory
pub struct LocalBackend {
    train: TrainCommand,
    predict: PredictCommand,
    result: ResultQuery,
    params: ParamsQuery,
    model_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(dataset: Option<&Path>, model_dir: &Path) -> Self {
        let source = data_source(dataset);
        let repository = Arc::new(FileRepository::new(model_dir));
        let logger = StructuredLogger::new("cli");
        Self {
            train: TrainCommand::new(source, repository.clone(), logger.clone()),
            predict: PredictCommand::new(repository.clone(), logger),
            result: ResultQuery::new(repository.clone()),
            params: ParamsQuery::new(repository),
            model_dir: model_dir.to_path_buf(),
        }
    }
}

pub enum Backend {
    Local(LocalBackend),
    Remote(ApiClient),
}

impl Backend {
    pub fn local(dataset: Option<&Path>, model_dir: &Path) -> Self {
        debug!(model_dir = %model_dir.display(), "Running commands locally");
        Backend::Local(LocalBackend::new(dataset, model_dir))
    }

    pub fn remote(api_url: &str) -> Result<Self> {
        let client = ApiClient::new(api_url)?;
        debug!(api_url = %client.base_url(), "Running commands against server");
        Ok(Backend::Remote(client))
    }

    /// Where commands run, for display
    pub fn describe(&self) -> String {
        match self {
            Backend::Local(local) => format!("local model in {}", local.model_dir.display()),
            Backend::Remote(client) => format!("server at {}", client.base_url()),
        }
    }

    pub async fn train(&self, input: &TrainInput) -> Result<CommandResult<EvaluationResult>> {
        match self {
            Backend::Local(local) => Ok(local.train.execute(input)),
            Backend::Remote(client) => client.post("api/v1/train", input).await,
        }
    }

    pub async fn predict(&self, input: &PredictInput) -> Result<CommandResult<PredictionOutput>> {
        match self {
            Backend::Local(local) => Ok(local.predict.execute(input)),
            Backend::Remote(client) => client.post("api/v1/predict", input).await,
        }
    }

    pub async fn stored_result(&self) -> Result<CommandResult<EvaluationResult>> {
        match self {
            Backend::Local(local) => Ok(local.result.execute()),
            Backend::Remote(client) => client.get("api/v1/result").await,
        }
    }

    pub async fn stored_params(&self) -> Result<CommandResult<HyperParameters>> {
        match self {
            Backend::Local(local) => Ok(local.params.execute()),
            Backend::Remote(client) => client.get("api/v1/params").await,
        }
    }
}
