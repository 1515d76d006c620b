//! Digit dataset storage and sources
//!
//! The canonical dataset is 1797 grayscale 8x8 digit images flattened to 64
//! features with intensities in 0..=16, labelled 0-9. It is read from the
//! headerless `digits.csv` layout (64 pixel columns followed by the label).

use crate::error::{ModelError, Result};
use crate::evaluation::Split;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};

/// Side length of a digit image
pub const IMAGE_SIDE: usize = 8;

/// Features per flattened image
pub const PIXEL_COUNT: usize = IMAGE_SIDE * IMAGE_SIDE;

/// Number of digit classes
pub const CLASS_COUNT: usize = 10;

/// Maximum pixel intensity
pub const MAX_INTENSITY: f64 = 16.0;

/// Full feature/label arrays plus the partitions of the latest split
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    features: Option<Array2<f64>>,
    labels: Option<Array1<usize>>,
    split: Option<Split>,
}

impl Dataset {
    /// A freshly loaded dataset with no partitions
    pub fn loaded(features: Array2<f64>, labels: Array1<usize>) -> Self {
        Self {
            features: Some(features),
            labels: Some(labels),
            split: None,
        }
    }

    /// Same full arrays, with `split` as the current partition
    pub fn with_split(&self, split: Split) -> Self {
        Self {
            features: self.features.clone(),
            labels: self.labels.clone(),
            split: Some(split),
        }
    }

    pub fn features(&self) -> Option<&Array2<f64>> {
        self.features.as_ref()
    }

    pub fn labels(&self) -> Option<&Array1<usize>> {
        self.labels.as_ref()
    }

    pub fn train_features(&self) -> Option<&Array2<f64>> {
        self.split.as_ref().map(|s| &s.train_features)
    }

    pub fn train_labels(&self) -> Option<&Array1<usize>> {
        self.split.as_ref().map(|s| &s.train_labels)
    }

    pub fn test_features(&self) -> Option<&Array2<f64>> {
        self.split.as_ref().map(|s| &s.test_features)
    }

    pub fn test_labels(&self) -> Option<&Array1<usize>> {
        self.split.as_ref().map(|s| &s.test_labels)
    }

    pub fn is_loaded(&self) -> bool {
        self.features.is_some() && self.labels.is_some()
    }

    pub fn is_split(&self) -> bool {
        self.split.is_some()
    }

    pub fn total_records(&self) -> usize {
        self.labels.as_ref().map_or(0, |l| l.len())
    }

    pub fn feature_count(&self) -> usize {
        self.features.as_ref().map_or(0, |f| f.ncols())
    }
}

/// Supplies the digits dataset to [`crate::model::ClassificationModel::load`]
pub trait DataSource: Send + Sync {
    /// Return `(features, labels)` with one row per record
    fn load(&self) -> Result<(Array2<f64>, Array1<usize>)>;
}

/// Reads the headerless `digits.csv` layout
#[derive(Debug, Clone)]
pub struct CsvDigitsSource {
    path: PathBuf,
}

impl CsvDigitsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_label(raw: &str, line: u64) -> Result<usize> {
        let value: f64 = raw.trim().parse().map_err(|_| {
            ModelError::DataSource(format!("line {}: label {:?} is not a number", line, raw))
        })?;
        if value.fract() != 0.0 || value < 0.0 || value >= CLASS_COUNT as f64 {
            return Err(ModelError::DataSource(format!(
                "line {}: label {} is not a digit class",
                line, value
            )));
        }
        Ok(value as usize)
    }
}

impl DataSource for CsvDigitsSource {
    fn load(&self) -> Result<(Array2<f64>, Array1<usize>)> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| {
                ModelError::DataSource(format!("failed to open {}: {}", self.path.display(), e))
            })?;

        let mut pixels = Vec::new();
        let mut labels = Vec::new();

        for record in reader.records() {
            let record = record.map_err(|e| ModelError::DataSource(e.to_string()))?;
            let line = record.position().map_or(0, |p| p.line());

            if record.len() != PIXEL_COUNT + 1 {
                return Err(ModelError::DataSource(format!(
                    "line {}: expected {} columns, got {}",
                    line,
                    PIXEL_COUNT + 1,
                    record.len()
                )));
            }

            for field in record.iter().take(PIXEL_COUNT) {
                let value: f64 = field.parse().map_err(|_| {
                    ModelError::DataSource(format!(
                        "line {}: pixel {:?} is not a number",
                        line, field
                    ))
                })?;
                pixels.push(value);
            }
            labels.push(Self::parse_label(&record[PIXEL_COUNT], line)?);
        }

        if labels.is_empty() {
            return Err(ModelError::DataSource(format!(
                "{} contains no records",
                self.path.display()
            )));
        }

        let features = Array2::from_shape_vec((labels.len(), PIXEL_COUNT), pixels)
            .map_err(|e| ModelError::DataSource(e.to_string()))?;
        Ok((features, Array1::from_vec(labels)))
    }
}

/// Serves arrays that are already in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    features: Array2<f64>,
    labels: Array1<usize>,
}

impl InMemorySource {
    pub fn new(features: Array2<f64>, labels: Array1<usize>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(ModelError::DataSource(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }
}

impl DataSource for InMemorySource {
    fn load(&self) -> Result<(Array2<f64>, Array1<usize>)> {
        Ok((self.features.clone(), self.labels.clone()))
    }
}

/// Placeholder used when no dataset file has been configured; every load
/// fails with a [`ModelError::DataSource`] carrying `hint`
#[derive(Debug, Clone)]
pub struct UnconfiguredSource {
    hint: String,
}

impl UnconfiguredSource {
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }
}

impl DataSource for UnconfiguredSource {
    fn load(&self) -> Result<(Array2<f64>, Array1<usize>)> {
        Err(ModelError::DataSource(format!(
            "no digits dataset configured; {}",
            self.hint
        )))
    }
}

/// Glyph outlines for the ten digit classes
#[cfg(any(test, feature = "synthetic"))]
const GLYPHS: [[&str; IMAGE_SIDE]; CLASS_COUNT] = [
    [
        "..####..", ".##..##.", ".##..##.", ".##..##.", ".##..##.", ".##..##.", ".##..##.",
        "..####..",
    ],
    [
        "...##...", "..###...", ".####...", "...##...", "...##...", "...##...", "...##...",
        ".######.",
    ],
    [
        "..####..", ".##..##.", ".....##.", "....##..", "...##...", "..##....", ".##.....",
        ".######.",
    ],
    [
        ".#####..", ".....##.", ".....##.", "..####..", ".....##.", ".....##.", ".....##.",
        ".#####..",
    ],
    [
        "....##..", "...###..", "..#.##..", ".#..##..", ".######.", "....##..", "....##..",
        "....##..",
    ],
    [
        ".######.", ".##.....", ".##.....", ".#####..", ".....##.", ".....##.", ".##..##.",
        "..####..",
    ],
    [
        "..####..", ".##.....", ".##.....", ".#####..", ".##..##.", ".##..##.", ".##..##.",
        "..####..",
    ],
    [
        ".######.", ".....##.", "....##..", "....##..", "...##...", "...##...", "..##....",
        "..##....",
    ],
    [
        "..####..", ".##..##.", ".##..##.", "..####..", ".##..##.", ".##..##.", ".##..##.",
        "..####..",
    ],
    [
        "..####..", ".##..##.", ".##..##.", "..#####.", ".....##.", ".....##.", ".....##.",
        "..####..",
    ],
];

/// Deterministic digit-like images drawn from fixed glyphs with pixel noise.
///
/// Test fixture only, compiled with the `synthetic` feature; the shape
/// (records x 64, classes 0-9, intensities 0..=16) matches the canonical
/// dataset.
#[cfg(any(test, feature = "synthetic"))]
#[derive(Debug, Clone, Copy)]
pub struct SyntheticDigits {
    records: usize,
    seed: u64,
}

#[cfg(any(test, feature = "synthetic"))]
impl SyntheticDigits {
    /// Same record count as the canonical dataset
    pub const CANONICAL_RECORDS: usize = 1797;

    pub fn new(records: usize, seed: u64) -> Self {
        Self { records, seed }
    }

    /// The clean glyph for `digit` as 64 intensities
    pub fn glyph(digit: usize) -> [f64; PIXEL_COUNT] {
        let mut pixels = [0.0; PIXEL_COUNT];
        for (row, line) in GLYPHS[digit % CLASS_COUNT].iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                if ch == '#' {
                    pixels[row * IMAGE_SIDE + col] = MAX_INTENSITY;
                }
            }
        }
        pixels
    }

    /// Write the records in the headerless `digits.csv` layout
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let csv_err = |e: csv::Error| ModelError::DataSource(format!("{}: {}", path.display(), e));

        let (features, labels) = self.load()?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(csv_err)?;
        for (row, label) in features.rows().into_iter().zip(labels.iter()) {
            let mut record: Vec<String> = row.iter().map(|v| (*v as u8).to_string()).collect();
            record.push(label.to_string());
            writer.write_record(&record).map_err(csv_err)?;
        }
        writer
            .flush()
            .map_err(|e| ModelError::DataSource(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(any(test, feature = "synthetic"))]
impl Default for SyntheticDigits {
    fn default() -> Self {
        Self::new(Self::CANONICAL_RECORDS, 0)
    }
}

#[cfg(any(test, feature = "synthetic"))]
impl DataSource for SyntheticDigits {
    fn load(&self) -> Result<(Array2<f64>, Array1<usize>)> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(self.seed);
        let glyphs: Vec<[f64; PIXEL_COUNT]> = (0..CLASS_COUNT).map(Self::glyph).collect();

        let mut pixels = Vec::with_capacity(self.records * PIXEL_COUNT);
        let mut labels = Vec::with_capacity(self.records);

        for i in 0..self.records {
            let digit = i % CLASS_COUNT;
            for &base in glyphs[digit].iter() {
                let noise: f64 = rng.gen_range(-3.0..=3.0);
                pixels.push((base + noise).round().clamp(0.0, MAX_INTENSITY));
            }
            labels.push(digit);
        }

        let features = Array2::from_shape_vec((self.records, PIXEL_COUNT), pixels)
            .map_err(|e| ModelError::DataSource(e.to_string()))?;
        Ok((features, Array1::from_vec(labels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_row(label: usize) -> String {
        let mut fields: Vec<String> = SyntheticDigits::glyph(label)
            .iter()
            .map(|v| format!("{}", *v as u8))
            .collect();
        fields.push(label.to_string());
        fields.join(",")
    }

    #[test]
    fn test_csv_source_reads_records() {
        let mut file = NamedTempFile::new().unwrap();
        for label in [0, 3, 9] {
            writeln!(file, "{}", csv_row(label)).unwrap();
        }

        let (features, labels) = CsvDigitsSource::new(file.path()).load().unwrap();
        assert_eq!(features.dim(), (3, PIXEL_COUNT));
        assert_eq!(labels.to_vec(), vec![0, 3, 9]);
        assert_eq!(features[[0, 2]], MAX_INTENSITY);
    }

    #[test]
    fn test_csv_source_rejects_short_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1,2,3,4").unwrap();
        assert!(matches!(
            CsvDigitsSource::new(file.path()).load(),
            Err(ModelError::DataSource(_))
        ));
    }

    #[test]
    fn test_csv_source_rejects_bad_label() {
        let mut file = NamedTempFile::new().unwrap();
        let row = csv_row(1);
        let bad = format!("{}12", &row[..row.len() - 1]);
        writeln!(file, "{}", bad).unwrap();
        assert!(CsvDigitsSource::new(file.path()).load().is_err());
    }

    #[test]
    fn test_csv_source_missing_file() {
        let source = CsvDigitsSource::new("/nonexistent/digits.csv");
        assert!(matches!(source.load(), Err(ModelError::DataSource(_))));
    }

    #[test]
    fn test_synthetic_shape_and_determinism() {
        let source = SyntheticDigits::default();
        let (features, labels) = source.load().unwrap();
        assert_eq!(features.dim(), (1797, 64));
        assert_eq!(labels.len(), 1797);
        assert!(labels.iter().all(|&l| l < CLASS_COUNT));
        assert!(features.iter().all(|&v| (0.0..=MAX_INTENSITY).contains(&v)));

        let (again, _) = source.load().unwrap();
        assert_eq!(features, again);
    }

    #[test]
    fn test_unconfigured_source_fails() {
        let err = UnconfiguredSource::new("set DIGITS_DATASET_PATH")
            .load()
            .unwrap_err();
        assert!(matches!(err, ModelError::DataSource(_)));
        assert!(err.to_string().contains("DIGITS_DATASET_PATH"));
    }

    #[test]
    fn test_written_csv_reads_back() {
        let file = NamedTempFile::new().unwrap();
        let source = SyntheticDigits::new(25, 9);
        source.write_csv(file.path()).unwrap();

        let (features, labels) = CsvDigitsSource::new(file.path()).load().unwrap();
        let (expected_features, expected_labels) = source.load().unwrap();
        assert_eq!(features, expected_features);
        assert_eq!(labels, expected_labels);
    }

    #[test]
    fn test_dataset_lifecycle() {
        let empty = Dataset::default();
        assert!(!empty.is_loaded());
        assert!(empty.features().is_none());
        assert!(empty.test_features().is_none());

        let (features, labels) = SyntheticDigits::new(20, 1).load().unwrap();
        let loaded = Dataset::loaded(features, labels);
        assert!(loaded.is_loaded());
        assert!(!loaded.is_split());
        assert_eq!(loaded.total_records(), 20);
        assert_eq!(loaded.feature_count(), 64);
    }
}
