//! Persist CLI defaults

use anyhow::Result;

use crate::config::Config;
use crate::output::{print_json, print_success, OutputFormat};

/// Merge `update` into the stored configuration and save it
pub fn configure(update: Config, format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    config.merge(update);
    let path = config.save()?;

    match format {
        OutputFormat::Json => print_json(&config),
        OutputFormat::Table => {
            print_success(&format!("Configuration saved to {}", path.display()));
            Ok(())
        }
    }
}
