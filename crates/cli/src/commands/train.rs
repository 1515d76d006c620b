//! Train command

use anyhow::Result;

use super::require;
use crate::backend::Backend;
use crate::output::{print_info, print_result, print_success, OutputFormat};
use digits_lib::TrainInput;

/// Train, evaluate and persist a model, then print its evaluation
pub async fn train(backend: &Backend, input: TrainInput, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Table) {
        print_info(&format!("Training on {}...", backend.describe()));
    }

    let result = backend.train(&input).await?;
    let message = result.message.clone();
    let evaluation = require(result)?;

    if matches!(format, OutputFormat::Table) {
        print_success(&message);
    }
    print_result(&evaluation, format)
}
