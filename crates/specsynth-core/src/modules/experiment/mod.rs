mod parser;

pub use parser::{ColumnDelimiter, parse_experimental_source};

use crate::domain::SynthError;
use crate::numerics::{deterministic_argsort, max_normalized};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Measured `(wavelength, intensity)` samples, ascending in wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalSpectrum {
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("failed to read experimental spectrum '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unsupported experimental spectrum extension for '{}', expected .csv or .txt", path.display())]
    UnsupportedExtension { path: PathBuf },
    #[error("expected 2 columns at line {line} of '{source_label}', found {found}")]
    ColumnCount {
        source_label: String,
        line: usize,
        found: usize,
    },
    #[error("malformed CSV in '{source_label}': {source}")]
    Csv {
        source_label: String,
        source: csv::Error,
    },
    #[error("column {column} at line {line} of '{source_label}' is not a number: '{value}'")]
    InvalidNumber {
        source_label: String,
        line: usize,
        column: usize,
        value: String,
    },
    #[error("experimental spectrum has mismatched columns: {wavelengths} wavelengths, {intensities} intensities")]
    LengthMismatch {
        wavelengths: usize,
        intensities: usize,
    },
    #[error("experimental spectrum '{source_label}' contains no samples")]
    Empty { source_label: String },
    #[error("no experimental samples lie strictly inside [{min}, {max}] nm")]
    EmptyRange { min: f64, max: f64 },
}

impl ExperimentalSpectrum {
    /// Builds a spectrum from paired columns; rows are reordered by wavelength.
    pub fn from_samples(
        wavelengths: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, ExperimentError> {
        if wavelengths.len() != intensities.len() {
            return Err(ExperimentError::LengthMismatch {
                wavelengths: wavelengths.len(),
                intensities: intensities.len(),
            });
        }
        if wavelengths.is_empty() {
            return Err(ExperimentError::Empty {
                source_label: "in-memory samples".to_string(),
            });
        }

        let order = deterministic_argsort(&wavelengths);
        Ok(Self {
            wavelengths: order.iter().map(|&index| wavelengths[index]).collect(),
            intensities: order.iter().map(|&index| intensities[index]).collect(),
        })
    }

    /// Loads a `.csv` (comma separated) or `.txt` (whitespace separated) file whose first line is a header.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExperimentError> {
        let path = path.as_ref();
        let delimiter = ColumnDelimiter::for_path(path).ok_or_else(|| {
            ExperimentError::UnsupportedExtension {
                path: path.to_path_buf(),
            }
        })?;
        let text = fs::read_to_string(path).map_err(|source| ExperimentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let label = path.display().to_string();
        let (wavelengths, intensities) = parse_experimental_source(&label, &text, delimiter)?;
        if wavelengths.is_empty() {
            return Err(ExperimentError::Empty {
                source_label: label,
            });
        }
        Self::from_samples(wavelengths, intensities)
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// `[min, max]` of the wavelength column.
    pub fn wavelength_range(&self) -> (f64, f64) {
        let first = self.wavelengths.first().copied().unwrap_or(f64::NAN);
        let last = self.wavelengths.last().copied().unwrap_or(f64::NAN);
        (first, last)
    }

    /// Intensities divided by their maximum, `None` when nothing is positive.
    pub fn normalized_intensities(&self) -> Option<Vec<f64>> {
        max_normalized(&self.intensities)
    }

    /// Keeps the samples with `min < wavelength < max`.
    pub fn restrict_to(&self, min: f64, max: f64) -> Result<Self, ExperimentError> {
        let (wavelengths, intensities): (Vec<f64>, Vec<f64>) = self
            .wavelengths
            .iter()
            .zip(&self.intensities)
            .filter(|(wavelength, _)| **wavelength > min && **wavelength < max)
            .map(|(wavelength, intensity)| (*wavelength, *intensity))
            .unzip();

        if wavelengths.is_empty() {
            return Err(ExperimentError::EmptyRange { min, max });
        }
        Ok(Self {
            wavelengths,
            intensities,
        })
    }
}

impl From<ExperimentError> for SynthError {
    fn from(error: ExperimentError) -> Self {
        match error {
            ExperimentError::Read { .. } => {
                SynthError::io_system("IO.EXPERIMENTAL_SPECTRUM", error.to_string())
            }
            _ => SynthError::input_validation("INPUT.EXPERIMENTAL_SPECTRUM", error.to_string()),
        }
    }
}
