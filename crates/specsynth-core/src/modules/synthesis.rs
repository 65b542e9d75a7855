use crate::domain::{CurveKind, SynthError};
use crate::modules::broadening::IonizationStageSpectrum;
use crate::modules::ion_balance::AbundanceVector;
use crate::numerics::relative_difference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const AXIS_RELATIVE_TOLERANCE: f64 = 1.0e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error("stage {ion} spectrum has {found} samples, the synthesis axis has {expected}")]
    AxisMismatch {
        ion: u32,
        expected: usize,
        found: usize,
    },
    #[error(
        "stage {ion} spectrum sample {index} sits at {found} nm, the synthesis axis has {expected} nm"
    )]
    AxisValueMismatch {
        ion: u32,
        index: usize,
        expected: f64,
        found: f64,
    },
}

impl From<SynthesisError> for SynthError {
    fn from(error: SynthesisError) -> Self {
        SynthError::computation("RUN.SYNTHESIS", error.to_string())
    }
}

/// Abundance-weighted sum of the stage curves for one plasma point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedSpectrum {
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl SynthesizedSpectrum {
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
}

/// Computes `y[i] = Σ_stage f(stage) · curve_stage[i]` on `axis`.
///
/// Every stage spectrum must already sit on `axis`; stages missing from
/// `stage_spectra` contribute nothing, and stages outside the abundance vector
/// carry a zero fraction.
pub fn synthesize(
    stage_spectra: &BTreeMap<u32, IonizationStageSpectrum>,
    abundances: &AbundanceVector,
    axis: &[f64],
    curve: CurveKind,
) -> Result<SynthesizedSpectrum, SynthesisError> {
    for (ion, spectrum) in stage_spectra {
        check_axis(*ion, spectrum, axis)?;
    }

    let mut intensities = vec![0.0; axis.len()];
    for (ion, spectrum) in stage_spectra {
        let fraction = abundances.fraction(*ion);
        if fraction == 0.0 {
            continue;
        }
        for (total, value) in intensities.iter_mut().zip(spectrum.curve(curve)) {
            *total += fraction * value;
        }
    }

    Ok(SynthesizedSpectrum {
        wavelengths: axis.to_vec(),
        intensities,
    })
}

fn check_axis(
    ion: u32,
    spectrum: &IonizationStageSpectrum,
    axis: &[f64],
) -> Result<(), SynthesisError> {
    if spectrum.len() != axis.len() {
        return Err(SynthesisError::AxisMismatch {
            ion,
            expected: axis.len(),
            found: spectrum.len(),
        });
    }

    match spectrum
        .wavelengths
        .iter()
        .zip(axis)
        .position(|(found, expected)| {
            relative_difference(*found, *expected, f64::MIN_POSITIVE) > AXIS_RELATIVE_TOLERANCE
        }) {
        Some(index) => Err(SynthesisError::AxisValueMismatch {
            ion,
            index,
            expected: axis[index],
            found: spectrum.wavelengths[index],
        }),
        None => Ok(()),
    }
}
