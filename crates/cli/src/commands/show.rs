//! Show the stored model's parameters and evaluation

use anyhow::Result;
use serde_json::json;

use super::require;
use crate::backend::Backend;
use crate::output::{print_json, print_params, print_result, OutputFormat};

pub async fn show(backend: &Backend, format: OutputFormat) -> Result<()> {
    let params = require(backend.stored_params().await?)?;
    let result = require(backend.stored_result().await?)?;

    match format {
        OutputFormat::Json => print_json(&json!({ "params": params, "result": result })),
        OutputFormat::Table => {
            print_params(&params, format)?;
            println!();
            print_result(&result, format)
        }
    }
}
