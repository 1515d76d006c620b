//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use digits_lib::{EvaluationResult, HyperParameters};
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl FieldRow {
    fn new(field: &'static str, value: impl ToString) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a fraction as a percentage
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.2}%", accuracy * 100.0)
}

/// Color accuracy based on value
pub fn color_accuracy(accuracy: f64) -> String {
    let formatted = format_accuracy(accuracy);
    if accuracy >= 0.9 {
        formatted.green().to_string()
    } else if accuracy >= 0.7 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Summary table of an evaluation run
pub fn result_table(result: &EvaluationResult) -> String {
    let rows = vec![
        FieldRow::new("Accuracy", format_accuracy(result.accuracy)),
        FieldRow::new(
            "Cross-validation accuracy",
            result
                .crossval_accuracy
                .map_or_else(|| result.crossval_display(), format_accuracy),
        ),
        FieldRow::new(
            "Evaluated at",
            result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        ),
        FieldRow::new("Features", result.feature_count),
        FieldRow::new("Total records", result.total_records),
        FieldRow::new("Training records", result.train_records),
        FieldRow::new("Test records", result.test_records),
        FieldRow::new("Misclassified", result.error_count),
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Confusion matrix with true labels as rows and predicted labels as columns
pub fn confusion_table(result: &EvaluationResult) -> String {
    let mut builder = Builder::default();

    let mut header = vec!["true \\ pred".to_string()];
    header.extend(result.class_labels.iter().map(ToString::to_string));
    builder.push_record(header);

    for (label, counts) in result.class_labels.iter().zip(&result.confusion_matrix) {
        let mut row = vec![label.to_string()];
        row.extend(counts.iter().map(ToString::to_string));
        builder.push_record(row);
    }

    builder.build().with(Style::rounded()).to_string()
}

pub fn params_table(params: &HyperParameters) -> String {
    let k_fold = match params.k_fold() {
        0 => "disabled".to_string(),
        k => k.to_string(),
    };
    let rows = vec![
        FieldRow::new("Seed", params.seed()),
        FieldRow::new("Test size", params.test_size()),
        FieldRow::new("Neighbors (k)", params.k_neighbors()),
        FieldRow::new("Folds (k-fold)", k_fold),
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print an evaluation result in the requested format
pub fn print_result(result: &EvaluationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => {
            println!("{}", "Evaluation Result".bold());
            println!("{}", result_table(result));
            println!(
                "{} {}",
                "Accuracy:".bold(),
                color_accuracy(result.accuracy)
            );
            println!();
            println!("{}", "Confusion Matrix".bold());
            println!("{}", confusion_table(result));
        }
    }
    Ok(())
}

pub fn print_params(params: &HyperParameters, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(params)?,
        OutputFormat::Table => {
            println!("{}", "Hyperparameters".bold());
            println!("{}", params_table(params));
        }
    }
    Ok(())
}
