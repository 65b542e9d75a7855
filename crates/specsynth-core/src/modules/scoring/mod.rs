//! Similarity between a measured and a synthetic spectrum.
//!
//! Every metric works on the overlap of the two wavelength ranges. The
//! candidate is linearly interpolated (extrapolating past its end points) onto
//! the reference wavelengths and both series are divided by their own maxima.

mod metrics;

use crate::domain::{SimilarityMethod, SynthError};
use crate::modules::experiment::ExperimentalSpectrum;
use crate::modules::synthesis::SynthesizedSpectrum;
use crate::numerics::{deterministic_argsort, max_normalized, resample_linear_extrapolated};
use metrics::{
    coefficient_of_determination, dtw_distance, nearest_point_distance, pearson_correlation,
};

const MIN_OVERLAP_POINTS: usize = 2;

/// Read access to a sampled `(wavelength, intensity)` curve.
pub trait SpectralSeries {
    fn wavelengths(&self) -> &[f64];
    fn intensities(&self) -> &[f64];
}

impl SpectralSeries for ExperimentalSpectrum {
    fn wavelengths(&self) -> &[f64] {
        ExperimentalSpectrum::wavelengths(self)
    }

    fn intensities(&self) -> &[f64] {
        ExperimentalSpectrum::intensities(self)
    }
}

impl SpectralSeries for SynthesizedSpectrum {
    fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    fn intensities(&self) -> &[f64] {
        &self.intensities
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error(
        "wavelength ranges do not overlap: reference [{}, {}] nm, candidate [{}, {}] nm",
        .reference.0, .reference.1, .candidate.0, .candidate.1
    )]
    RangeMismatch {
        reference: (f64, f64),
        candidate: (f64, f64),
    },
    #[error("{series} series has {found} points inside the overlap, at least 2 are needed")]
    InsufficientOverlap { series: &'static str, found: usize },
    #[error("{series} series has no positive intensity inside the overlap")]
    ZeroIntensity { series: &'static str },
    #[error("{method} is undefined for a constant series")]
    DegenerateSeries { method: SimilarityMethod },
    #[error("series lengths differ: {wavelengths} wavelengths, {intensities} intensities")]
    LengthMismatch {
        wavelengths: usize,
        intensities: usize,
    },
}

impl From<ScoringError> for SynthError {
    fn from(error: ScoringError) -> Self {
        match error {
            ScoringError::RangeMismatch { .. } | ScoringError::LengthMismatch { .. } => {
                SynthError::input_validation("INPUT.SCORING", error.to_string())
            }
            _ => SynthError::computation("RUN.SCORING", error.to_string()),
        }
    }
}

/// Both series restricted to the overlap, normalized, candidate resampled
/// onto the reference wavelengths.
#[derive(Debug, Clone, PartialEq)]
struct AlignedSeries {
    wavelengths: Vec<f64>,
    reference: Vec<f64>,
    candidate: Vec<f64>,
    /// Candidate points inside the overlap on their own axis, normalized.
    candidate_points: (Vec<f64>, Vec<f64>),
}

impl AlignedSeries {
    fn build(
        reference: &dyn SpectralSeries,
        candidate: &dyn SpectralSeries,
    ) -> Result<Self, ScoringError> {
        let reference_range = wavelength_range(reference, "reference")?;
        let candidate_range = wavelength_range(candidate, "candidate")?;
        let low = reference_range.0.max(candidate_range.0);
        let high = reference_range.1.min(candidate_range.1);
        if low > high {
            return Err(ScoringError::RangeMismatch {
                reference: reference_range,
                candidate: candidate_range,
            });
        }

        let (reference_x, reference_y) = sorted_window(reference, low, high, "reference")?;
        let (candidate_x, candidate_y) = sorted_window(candidate, low, high, "candidate")?;

        let resampled = resample_linear_extrapolated(&reference_x, &candidate_x, &candidate_y)
            .ok_or(ScoringError::InsufficientOverlap {
                series: "candidate",
                found: candidate_x.len(),
            })?;

        let reference_normalized =
            max_normalized(&reference_y).ok_or(ScoringError::ZeroIntensity {
                series: "reference",
            })?;
        let candidate_normalized = max_normalized(&resampled).ok_or(ScoringError::ZeroIntensity {
            series: "candidate",
        })?;
        let candidate_points = max_normalized(&candidate_y).ok_or(ScoringError::ZeroIntensity {
            series: "candidate",
        })?;

        Ok(Self {
            wavelengths: reference_x,
            reference: reference_normalized,
            candidate: candidate_normalized,
            candidate_points: (candidate_x, candidate_points),
        })
    }

    fn score(&self, method: SimilarityMethod) -> Result<f64, ScoringError> {
        let value = match method {
            SimilarityMethod::NearestPoint => nearest_point_distance(
                (&self.wavelengths, &self.reference),
                (&self.candidate_points.0, &self.candidate_points.1),
            ),
            SimilarityMethod::RSquared => {
                coefficient_of_determination(&self.reference, &self.candidate)
            }
            SimilarityMethod::DynamicTimeWarping => dtw_distance(&self.reference, &self.candidate),
            SimilarityMethod::Pearson => pearson_correlation(&self.reference, &self.candidate),
        };
        value.ok_or(ScoringError::DegenerateSeries { method })
    }
}

/// Scores `candidate` against `reference` (usually the measured spectrum).
///
/// Pearson is symmetric in its arguments when both series share a grid.
pub fn score(
    reference: &dyn SpectralSeries,
    candidate: &dyn SpectralSeries,
    method: SimilarityMethod,
) -> Result<f64, ScoringError> {
    AlignedSeries::build(reference, candidate)?.score(method)
}

fn wavelength_range(
    series: &dyn SpectralSeries,
    label: &'static str,
) -> Result<(f64, f64), ScoringError> {
    let wavelengths = series.wavelengths();
    if wavelengths.len() != series.intensities().len() {
        return Err(ScoringError::LengthMismatch {
            wavelengths: wavelengths.len(),
            intensities: series.intensities().len(),
        });
    }
    if wavelengths.len() < MIN_OVERLAP_POINTS {
        return Err(ScoringError::InsufficientOverlap {
            series: label,
            found: wavelengths.len(),
        });
    }

    let low = wavelengths.iter().copied().fold(f64::INFINITY, f64::min);
    let high = wavelengths.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((low, high))
}

/// Points with `low <= x <= high`, ascending in wavelength.
fn sorted_window(
    series: &dyn SpectralSeries,
    low: f64,
    high: f64,
    label: &'static str,
) -> Result<(Vec<f64>, Vec<f64>), ScoringError> {
    let wavelengths = series.wavelengths();
    let intensities = series.intensities();
    let (x, y): (Vec<f64>, Vec<f64>) = deterministic_argsort(wavelengths)
        .into_iter()
        .filter(|index| wavelengths[*index] >= low && wavelengths[*index] <= high)
        .map(|index| (wavelengths[index], intensities[index]))
        .unzip();

    if x.len() < MIN_OVERLAP_POINTS {
        return Err(ScoringError::InsufficientOverlap {
            series: label,
            found: x.len(),
        });
    }
    Ok((x, y))
}
