//! CLI subcommand implementations

pub mod configure;
pub mod predict;
pub mod show;
pub mod train;

use anyhow::Result;
use digits_lib::CommandResult;

/// Payload of a successful command, or its message as an error
fn require<T>(result: CommandResult<T>) -> Result<T> {
    match result.data {
        Some(data) if result.success => Ok(data),
        _ => anyhow::bail!(result.message),
    }
}
