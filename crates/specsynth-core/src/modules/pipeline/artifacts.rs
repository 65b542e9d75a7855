use crate::domain::{PlasmaPoint, SimilarityMethod};
use crate::modules::broadening::{IonizationStageSpectrum, StickSpectrum};
use crate::modules::grid_scan::{BestCell, CellFailure, ScoreMatrix};
use crate::modules::ion_balance::AbundanceVector;
use crate::modules::serialization::{format_scientific_f64, render_columns};
use crate::modules::synthesis::SynthesizedSpectrum;
use serde::{Deserialize, Serialize};

pub fn broadened_artifact_name(ion: u32) -> String {
    format!("broadened_{ion}.dat")
}

pub fn sticks_artifact_name(ion: u32) -> String {
    format!("sticks_{ion}.dat")
}

/// Lives in a per-stage subdirectory so groups of different stages never clash.
pub fn group_artifact_name(ion: u32, (index_lower, index_upper): (i64, i64)) -> String {
    format!("groups_{ion}/broadened_{index_lower}_{index_upper}.dat")
}

pub const ABUNDANCE_ARTIFACT: &str = "abundance.dat";
pub const SYNTHETIC_ARTIFACT: &str = "synthetic.dat";
pub const SCORE_MATRIX_ARTIFACT: &str = "score_matrix.dat";
pub const SCAN_REPORT_ARTIFACT: &str = "scan.json";

pub fn render_stage_spectrum(spectrum: &IonizationStageSpectrum) -> String {
    render_columns(
        &["wavelength", "gaussian", "cross_unweighted", "cross_weighted"],
        &[
            spectrum.wavelengths.as_slice(),
            spectrum.gaussian.as_slice(),
            spectrum.cross_unweighted.as_slice(),
            spectrum.cross_weighted.as_slice(),
        ],
    )
}

pub fn render_sticks(sticks: &StickSpectrum) -> String {
    render_columns(
        &["wavelength", "strength"],
        &[sticks.wavelengths.as_slice(), sticks.intensities.as_slice()],
    )
}

pub fn render_abundances(
    strategy: &str,
    point: PlasmaPoint,
    abundances: &AbundanceVector,
    average_ionization: Option<f64>,
) -> String {
    let mut content = format!(
        "# strategy {strategy}\n# temperature {}\n# electron_density {}\n",
        point.temperature, point.electron_density
    );
    if let Some(average) = average_ionization {
        content.push_str(&format!("# average_ionization {average}\n"));
    }

    let stages: Vec<f64> = abundances.iter().map(|(stage, _)| f64::from(stage)).collect();
    content.push_str(&render_columns(
        &["stage", "fraction"],
        &[stages.as_slice(), abundances.fractions()],
    ));
    content
}

/// Synthetic spectrum preceded by one `# similarity` line per metric; metrics
/// that could not be evaluated print as NaN.
pub fn render_synthetic(
    point: PlasmaPoint,
    synthetic: &SynthesizedSpectrum,
    scores: &[(SimilarityMethod, Option<f64>)],
) -> String {
    let mut content = format!(
        "# temperature {}\n# electron_density {}\n",
        point.temperature, point.electron_density
    );
    for (method, value) in scores {
        content.push_str(&format!(
            "# similarity {method} {}\n",
            value.unwrap_or(f64::NAN)
        ));
    }
    content.push_str(&render_columns(
        &["wavelength", "intensity"],
        &[
            synthetic.wavelengths.as_slice(),
            synthetic.intensities.as_slice(),
        ],
    ));
    content
}

/// Header row of temperatures, then one row per density led by the density.
pub fn render_score_matrix(matrix: &ScoreMatrix) -> String {
    let mut content = format!("# {:>17}", "ne\\T");
    for temperature in &matrix.temperatures {
        content.push_str(&format_scientific_f64(*temperature, 19, 10));
    }
    content.push('\n');

    for (row, density) in matrix.densities.iter().enumerate() {
        content.push_str(&format_scientific_f64(*density, 19, 10));
        for score in matrix.row(row).unwrap_or_default() {
            content.push_str(&format_scientific_f64(*score, 19, 10));
        }
        content.push('\n');
    }
    content
}

/// JSON summary of a scan: axes, matrix rows with `null` for failed cells,
/// best cell and failure records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub method: SimilarityMethod,
    pub strategy: String,
    pub temperatures: Vec<f64>,
    pub densities: Vec<f64>,
    pub scores: Vec<Vec<Option<f64>>>,
    pub best: Option<BestCell>,
    pub failures: Vec<CellFailure>,
}

impl ScanReport {
    pub fn new(strategy: &str, matrix: &ScoreMatrix) -> Self {
        let scores = (0..matrix.rows())
            .map(|row| {
                matrix
                    .row(row)
                    .unwrap_or_default()
                    .iter()
                    .map(|score| score.is_finite().then_some(*score))
                    .collect()
            })
            .collect();
        Self {
            method: matrix.method,
            strategy: strategy.to_string(),
            temperatures: matrix.temperatures.clone(),
            densities: matrix.densities.clone(),
            scores,
            best: matrix.best_cell(),
            failures: matrix.failures.clone(),
        }
    }
}
