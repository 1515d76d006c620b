//! Predict command

use anyhow::{Context, Result};
use tabled::{settings::Style, Table, Tabled};

use super::require;
use crate::backend::Backend;
use crate::output::{print_json, OutputFormat};
use digits_lib::{dataset::PIXEL_COUNT, PixelInput, PredictInput};

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Sample")]
    sample: usize,
    #[tabled(rename = "Digit")]
    label: usize,
}

/// Parse comma-separated pixel values; `;` separates the samples of a batch
pub fn parse_pixels(raw: &str) -> Result<Vec<PixelInput>> {
    let samples: Vec<PixelInput> = raw
        .split(';')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .enumerate()
        .map(|(index, group)| {
            group
                .split(',')
                .map(|value| {
                    let value = value.trim();
                    match value.parse::<f64>() {
                        Ok(pixel) if pixel.is_finite() => Ok(pixel),
                        _ => anyhow::bail!("sample {}: {:?} is not a number", index + 1, value),
                    }
                })
                .collect::<Result<Vec<f64>>>()
                .map(PixelInput::Flat)
        })
        .collect::<Result<_>>()?;

    if samples.is_empty() {
        anyhow::bail!("no pixel values given; expected {} comma-separated values", PIXEL_COUNT);
    }
    Ok(samples)
}

/// Classify each sample and print the predicted digits
pub async fn predict(backend: &Backend, pixels: &str, format: OutputFormat) -> Result<()> {
    let mut rows = Vec::new();
    for (index, sample) in parse_pixels(pixels)?.into_iter().enumerate() {
        let output = require(backend.predict(&PredictInput { pixels: sample }).await?)
            .with_context(|| format!("sample {}", index + 1))?;
        rows.push(PredictionRow {
            sample: index + 1,
            label: output.label,
        });
    }

    match format {
        OutputFormat::Json => {
            let labels: Vec<usize> = rows.iter().map(|row| row.label).collect();
            print_json(&labels)
        }
        OutputFormat::Table => {
            println!("{}", Table::new(rows).with(Style::rounded()));
            Ok(())
        }
    }
}
