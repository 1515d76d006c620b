//! Shape normalization for prediction input

use crate::dataset::{IMAGE_SIDE, PIXEL_COUNT};
use crate::error::{ModelError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Pixel data in any of the accepted shapes.
///
/// JSON bodies deserialize untagged: a flat number list, a list of rows, or
/// a list of 8x8 images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PixelInput {
    /// A single 64-length vector
    Flat(Vec<f64>),
    /// A single 8x8 image, or a batch of 64-length vectors
    Grid(Vec<Vec<f64>>),
    /// A batch of 8x8 images
    Stack(Vec<Vec<Vec<f64>>>),
}

impl PixelInput {
    /// Describe the input dimensions, numpy style, for error messages
    pub fn shape(&self) -> String {
        match self {
            PixelInput::Flat(v) => format!("({},)", v.len()),
            PixelInput::Grid(rows) => format!("({}, {})", rows.len(), describe_width(rows)),
            PixelInput::Stack(images) => {
                let rows = images.first().map_or(0, |i| i.len());
                let cols = images
                    .first()
                    .map_or("0".to_string(), |image| describe_width(image));
                format!("({}, {}, {})", images.len(), rows, cols)
            }
        }
    }

    /// Normalize to a batch of flattened 64-pixel rows
    pub fn to_batch(&self) -> Result<Array2<f64>> {
        let batch = self.normalize()?;
        if let Some(value) = batch.iter().find(|v| !v.is_finite()) {
            return Err(ModelError::invalid_shape(format!(
                "pixel value {} is not a finite number",
                value
            )));
        }
        Ok(batch)
    }

    fn normalize(&self) -> Result<Array2<f64>> {
        match self {
            PixelInput::Flat(values) if values.len() == PIXEL_COUNT => {
                flatten(std::slice::from_ref(values))
            }
            PixelInput::Grid(rows) if is_image(rows) => {
                flatten(&[rows.iter().flatten().copied().collect()])
            }
            PixelInput::Grid(rows) if !rows.is_empty() && rows.iter().all(|r| r.len() == PIXEL_COUNT) => {
                flatten(rows)
            }
            PixelInput::Stack(images) if !images.is_empty() && images.iter().all(|i| is_image(i)) => {
                let rows: Vec<Vec<f64>> = images
                    .iter()
                    .map(|image| image.iter().flatten().copied().collect())
                    .collect();
                flatten(&rows)
            }
            _ => Err(ModelError::invalid_shape(format!(
                "unsupported feature shape {}; expected 8x8 or flattened 64-length vectors",
                self.shape()
            ))),
        }
    }
}

impl From<Vec<f64>> for PixelInput {
    fn from(values: Vec<f64>) -> Self {
        PixelInput::Flat(values)
    }
}

fn is_image(rows: &[Vec<f64>]) -> bool {
    rows.len() == IMAGE_SIDE && rows.iter().all(|r| r.len() == IMAGE_SIDE)
}

fn describe_width(rows: &[Vec<f64>]) -> String {
    match rows.first() {
        Some(first) if rows.iter().all(|r| r.len() == first.len()) => first.len().to_string(),
        Some(_) => "ragged".to_string(),
        None => "0".to_string(),
    }
}

fn flatten(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let data: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), PIXEL_COUNT), data)
        .map_err(|e| ModelError::invalid_shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(value: f64) -> Vec<Vec<f64>> {
        vec![vec![value; IMAGE_SIDE]; IMAGE_SIDE]
    }

    #[test]
    fn test_flat_vector() {
        let batch = PixelInput::Flat(vec![1.0; 64]).to_batch().unwrap();
        assert_eq!(batch.dim(), (1, 64));
    }

    #[test]
    fn test_single_image() {
        let mut img = image(0.0);
        img[7][7] = 5.0;
        let batch = PixelInput::Grid(img).to_batch().unwrap();
        assert_eq!(batch.dim(), (1, 64));
        assert_eq!(batch[[0, 63]], 5.0);
    }

    #[test]
    fn test_batch_of_vectors() {
        let batch = PixelInput::Grid(vec![vec![0.0; 64]; 3]).to_batch().unwrap();
        assert_eq!(batch.dim(), (3, 64));
    }

    #[test]
    fn test_batch_of_images() {
        let batch = PixelInput::Stack(vec![image(1.0), image(2.0)])
            .to_batch()
            .unwrap();
        assert_eq!(batch.dim(), (2, 64));
        assert_eq!(batch[[1, 0]], 2.0);
    }

    #[test]
    fn test_rejects_other_shapes() {
        let cases = vec![
            PixelInput::Flat(vec![0.0; 63]),
            PixelInput::Flat(vec![]),
            PixelInput::Grid(vec![vec![0.0; 8]; 7]),
            PixelInput::Grid(vec![vec![0.0; 64], vec![0.0; 63]]),
            PixelInput::Stack(vec![image(0.0), vec![vec![0.0; 8]; 9]]),
        ];
        for input in cases {
            let err = input.to_batch().unwrap_err();
            assert!(matches!(err, ModelError::InvalidShape(_)), "{:?}", input.shape());
        }
    }

    #[test]
    fn test_rejects_non_finite_pixels() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut pixels = vec![0.0; 64];
            pixels[10] = bad;
            let err = PixelInput::Flat(pixels).to_batch().unwrap_err();
            assert!(matches!(err, ModelError::InvalidShape(_)));
            assert!(err.to_string().contains("finite"));
        }

        let mut img = image(1.0);
        img[3][4] = f64::NAN;
        assert!(PixelInput::Grid(img).to_batch().is_err());
    }

    #[test]
    fn test_json_forms() {
        let flat: PixelInput = serde_json::from_str(&format!("[{}]", vec!["0"; 64].join(","))).unwrap();
        assert!(matches!(flat, PixelInput::Flat(_)));

        let grid: PixelInput = serde_json::to_value(image(0.0))
            .and_then(serde_json::from_value)
            .unwrap();
        assert!(matches!(grid, PixelInput::Grid(_)));

        let stack: PixelInput = serde_json::to_value(vec![image(0.0)])
            .and_then(serde_json::from_value)
            .unwrap();
        assert!(matches!(stack, PixelInput::Stack(_)));
    }

    #[test]
    fn test_shape_description() {
        assert_eq!(PixelInput::Flat(vec![0.0; 63]).shape(), "(63,)");
        assert_eq!(PixelInput::Grid(vec![vec![0.0; 8]; 7]).shape(), "(7, 8)");
    }
}
