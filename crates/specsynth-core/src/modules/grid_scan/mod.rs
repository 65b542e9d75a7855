//! Exhaustive (temperature, electron density) search.
//!
//! A scan runs in two phases on a dedicated rayon pool. Broadening depends on
//! temperature only, so phase one broadens every stage once per temperature
//! column. Phase two evaluates abundances, synthesis and score for every cell
//! and writes the result into the cell's own row-major slot.

mod model;

pub use model::{BestCell, CellFailure, GridAxis, GridSpacing, ScanGrid, ScoreMatrix};

use crate::domain::{CurveKind, PlasmaPoint, SimilarityMethod, SynthError};
use crate::modules::atomic::AtomicStructure;
use crate::modules::broadening::{
    AxisSpec, BroadeningEngine, BroadeningError, BroadeningRequest, IonizationStageSpectrum,
    WavelengthWindow,
};
use crate::modules::experiment::ExperimentalSpectrum;
use crate::modules::ion_balance::{AbundanceStrategy, AbundanceVector, IonBalanceError};
use crate::modules::line_list::LineList;
use crate::modules::scoring::{ScoringError, score};
use crate::modules::synthesis::{SynthesisError, SynthesizedSpectrum, synthesize};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("invalid {name} axis: {reason}")]
    InvalidAxis { name: &'static str, reason: String },
    #[error("scan needs at least one ionization stage with a line list")]
    NoStages,
    #[error("failed to build a scan pool with {workers} workers: {reason}")]
    ThreadPool { workers: usize, reason: String },
    #[error("scan was cancelled")]
    Cancelled,
    #[error("scan configuration is invalid: {0}")]
    Configuration(BroadeningError),
}

impl From<ScanError> for SynthError {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::InvalidAxis { .. } | ScanError::NoStages => {
                SynthError::input_validation("INPUT.SCAN", error.to_string())
            }
            ScanError::ThreadPool { .. } => {
                SynthError::internal("RUN.SCAN_POOL", error.to_string())
            }
            ScanError::Cancelled => {
                SynthError::computation("RUN.SCAN_CANCELLED", error.to_string())
            }
            ScanError::Configuration(_) => {
                SynthError::input_validation("INPUT.BROADENING", error.to_string())
            }
        }
    }
}

/// Why one plasma point could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PointError {
    #[error(transparent)]
    Broadening(#[from] BroadeningError),
    #[error(transparent)]
    IonBalance(#[from] IonBalanceError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl From<PointError> for SynthError {
    fn from(error: PointError) -> Self {
        match error {
            PointError::Broadening(inner) => inner.into(),
            PointError::IonBalance(inner) => inner.into(),
            PointError::Synthesis(inner) => inner.into(),
            PointError::Scoring(inner) => inner.into(),
        }
    }
}

/// Receives one notification per finished grid cell. Called from worker
/// threads.
pub trait ScanProgress: Sync {
    fn scan_started(&self, _total: usize) {}
    fn point_completed(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ScanProgress for NoProgress {
    fn point_completed(&self) {}
}

impl ScanProgress for AtomicUsize {
    fn point_completed(&self) {
        self.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a scan shares read-only across workers.
pub struct ScanInputs<'a> {
    pub atom: &'a AtomicStructure,
    pub experimental: &'a ExperimentalSpectrum,
    pub stage_lines: &'a BTreeMap<u32, LineList>,
    pub engine: &'a BroadeningEngine,
    pub strategy: &'a dyn AbundanceStrategy,
    pub window: WavelengthWindow,
    pub axis: AxisSpec,
    pub wavelength_shift: f64,
    pub curve: CurveKind,
    pub method: SimilarityMethod,
}

impl<'a> ScanInputs<'a> {
    /// Inputs with the experimental range as window and the experimental
    /// wavelengths as the synthesis axis.
    pub fn new(
        atom: &'a AtomicStructure,
        experimental: &'a ExperimentalSpectrum,
        stage_lines: &'a BTreeMap<u32, LineList>,
        engine: &'a BroadeningEngine,
        strategy: &'a dyn AbundanceStrategy,
    ) -> Self {
        let (min_nm, max_nm) = experimental.wavelength_range();
        Self {
            atom,
            experimental,
            stage_lines,
            engine,
            strategy,
            window: WavelengthWindow::new(min_nm, max_nm),
            axis: AxisSpec::Wavelengths(experimental.wavelengths().to_vec()),
            wavelength_shift: 0.0,
            curve: CurveKind::default(),
            method: SimilarityMethod::default(),
        }
    }

    pub fn with_window(mut self, window: WavelengthWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_axis(mut self, axis: AxisSpec) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_wavelength_shift(mut self, wavelength_shift: f64) -> Self {
        self.wavelength_shift = wavelength_shift;
        self
    }

    pub fn with_curve(mut self, curve: CurveKind) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_method(mut self, method: SimilarityMethod) -> Self {
        self.method = method;
        self
    }

    /// Broadened curves of every stage at `temperature`, all on one axis.
    pub fn broaden_stages(
        &self,
        temperature: f64,
    ) -> Result<BTreeMap<u32, IonizationStageSpectrum>, BroadeningError> {
        self.stage_lines
            .iter()
            .map(|(ion, lines)| {
                let request =
                    BroadeningRequest::new(*ion, temperature, self.window, self.axis.clone())
                        .with_wavelength_shift(self.wavelength_shift);
                self.engine
                    .broaden_or_zero(lines, &request)
                    .map(|spectrum| (*ion, spectrum))
            })
            .collect()
    }

    /// Abundances, synthetic spectrum and score at one density, reusing the
    /// stage curves of the point's temperature.
    pub fn evaluate_with_stages(
        &self,
        stage_spectra: &BTreeMap<u32, IonizationStageSpectrum>,
        point: PlasmaPoint,
    ) -> Result<PointEvaluation, PointError> {
        let abundances =
            self.strategy
                .abundances(self.atom, point.temperature, point.electron_density)?;
        let axis = stage_spectra
            .values()
            .next()
            .map(|spectrum| spectrum.wavelengths.as_slice())
            .unwrap_or_default();
        let synthetic = synthesize(stage_spectra, &abundances, axis, self.curve)?;
        let score = score(self.experimental, &synthetic, self.method)?;

        Ok(PointEvaluation {
            point,
            abundances,
            synthetic,
            score,
        })
    }
}

/// Full result for one plasma point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointEvaluation {
    pub point: PlasmaPoint,
    pub abundances: AbundanceVector,
    pub synthetic: SynthesizedSpectrum,
    pub score: f64,
}

/// Worker count used when none is configured: all cores but one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|cores| cores.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

#[derive(Debug, Clone)]
pub struct GridScanner {
    workers: usize,
    cancelled: Arc<AtomicBool>,
}

impl Default for GridScanner {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

impl GridScanner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Shared flag; setting it stops the scan before its next unit of work.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Single-point computation, identical to what a scan does per cell.
    pub fn evaluate_point(
        &self,
        inputs: &ScanInputs<'_>,
        point: PlasmaPoint,
    ) -> Result<PointEvaluation, PointError> {
        let stage_spectra = inputs.broaden_stages(point.temperature)?;
        inputs.evaluate_with_stages(&stage_spectra, point)
    }

    pub fn scan(
        &self,
        grid: &ScanGrid,
        inputs: &ScanInputs<'_>,
        progress: &dyn ScanProgress,
    ) -> Result<ScoreMatrix, ScanError> {
        if inputs.stage_lines.is_empty() {
            return Err(ScanError::NoStages);
        }
        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|error| ScanError::ThreadPool {
                workers: self.workers,
                reason: error.to_string(),
            })?;

        info!(
            temperatures = grid.columns(),
            densities = grid.rows(),
            workers = self.workers,
            method = %inputs.method,
            strategy = inputs.strategy.name(),
            "starting grid scan"
        );
        progress.scan_started(grid.len());

        let (scores, failures) = pool.install(|| self.run_phases(grid, inputs, progress))?;
        if self.is_cancelled() {
            info!("grid scan cancelled, discarding partial results");
            return Err(ScanError::Cancelled);
        }

        let matrix = ScoreMatrix {
            method: inputs.method,
            temperatures: grid.temperatures().to_vec(),
            densities: grid.densities().to_vec(),
            scores,
            failures,
        };
        info!(
            failed = matrix.failures.len(),
            best = ?matrix.best_cell(),
            "finished grid scan"
        );
        Ok(matrix)
    }

    fn run_phases(
        &self,
        grid: &ScanGrid,
        inputs: &ScanInputs<'_>,
        progress: &dyn ScanProgress,
    ) -> Result<(Vec<f64>, Vec<CellFailure>), ScanError> {
        let columns: Vec<Option<Result<BTreeMap<u32, IonizationStageSpectrum>, PointError>>> =
            grid.temperatures()
                .par_iter()
                .map(|&temperature| {
                    if self.is_cancelled() {
                        return None;
                    }
                    let stages = inputs.broaden_stages(temperature).map_err(PointError::from);
                    debug!(temperature, ok = stages.is_ok(), "broadened temperature column");
                    Some(stages)
                })
                .collect();

        // Only point-dependent failures become cells; a bad window, axis or
        // width would fail every column the same way.
        if let Some(error) = columns.iter().flatten().find_map(|column| match column {
            Err(PointError::Broadening(error)) if error.is_configuration() => Some(error.clone()),
            _ => None,
        }) {
            return Err(ScanError::Configuration(error));
        }

        let mut scores = vec![f64::NAN; grid.len()];
        let mut failures: Vec<CellFailure> = scores
            .par_iter_mut()
            .enumerate()
            .filter_map(|(index, cell)| {
                if self.is_cancelled() {
                    return None;
                }
                let (row, column) = grid.coordinates(index);
                let point = PlasmaPoint::new(grid.temperatures()[column], grid.densities()[row]);

                let outcome = match columns[column].as_ref()? {
                    Ok(stage_spectra) => inputs
                        .evaluate_with_stages(stage_spectra, point)
                        .map(|evaluation| evaluation.score),
                    Err(error) => Err(error.clone()),
                };
                progress.point_completed();

                match outcome {
                    Ok(value) => {
                        *cell = value;
                        None
                    }
                    Err(error) => {
                        warn!(
                            temperature = point.temperature,
                            electron_density = point.electron_density,
                            %error,
                            "grid cell failed"
                        );
                        Some(CellFailure {
                            row,
                            column,
                            temperature: point.temperature,
                            electron_density: point.electron_density,
                            reason: error.to_string(),
                        })
                    }
                }
            })
            .collect();
        failures.sort_by_key(|failure| (failure.row, failure.column));

        Ok((scores, failures))
    }
}
