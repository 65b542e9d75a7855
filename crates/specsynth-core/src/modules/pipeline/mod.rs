//! Project-driven executors: each one loads a project file, runs one stage of
//! the computation and writes its artifacts into the request's output
//! directory.

mod artifacts;

pub use artifacts::{
    ABUNDANCE_ARTIFACT, SCAN_REPORT_ARTIFACT, SCORE_MATRIX_ARTIFACT, SYNTHETIC_ARTIFACT,
    ScanReport, broadened_artifact_name, group_artifact_name, render_abundances,
    render_score_matrix, render_stage_spectrum, render_sticks, render_synthetic,
    sticks_artifact_name,
};

use super::ModuleExecutor;
use crate::domain::{
    ComputeArtifact, ComputeModule, ComputeRequest, ComputeResult, SimilarityMethod, SynthError,
};
use crate::modules::atomic::AtomicStructure;
use crate::modules::broadening::{BroadeningEngine, BroadeningRequest, stick_spectrum};
use crate::modules::experiment::ExperimentalSpectrum;
use crate::modules::grid_scan::{GridScanner, NoProgress, ScanInputs, ScanProgress};
use crate::modules::ion_balance::{AbundanceStrategy, AbundanceStrategyKind, IterativeChain};
use crate::modules::line_list::LineList;
use crate::modules::project::ProjectConfig;
use crate::modules::scoring::score;
use crate::modules::serialization::{write_json_artifact, write_text_artifact};
use crate::modules::synthesis::synthesize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Everything a project file points at, loaded once per run.
struct LoadedProject {
    config: ProjectConfig,
    atom: AtomicStructure,
    experimental: ExperimentalSpectrum,
    stage_lines: BTreeMap<u32, LineList>,
    engine: BroadeningEngine,
    strategy: Box<dyn AbundanceStrategy>,
}

impl LoadedProject {
    fn load(request: &ComputeRequest) -> ComputeResult<Self> {
        let config = ProjectConfig::load(&request.config_path)?;
        let atom = config.atomic_structure()?;
        let experimental = config.load_experimental()?;
        config.check_width(&config.window(&experimental))?;
        let stage_lines = config.load_stage_lines()?;
        let engine = config.engine();
        let strategy = config.abundance_strategy.strategy();
        info!(
            module = %request.module,
            element = atom.symbol(),
            stages = stage_lines.len(),
            samples = experimental.len(),
            "loaded project"
        );

        Ok(Self {
            config,
            atom,
            experimental,
            stage_lines,
            engine,
            strategy,
        })
    }

    fn inputs(&self, request: &ComputeRequest) -> ScanInputs<'_> {
        ScanInputs::new(
            &self.atom,
            &self.experimental,
            &self.stage_lines,
            &self.engine,
            self.strategy.as_ref(),
        )
        .with_window(self.config.window(&self.experimental))
        .with_axis(self.config.axis(&self.experimental))
        .with_wavelength_shift(self.config.broadening.wavelength_shift)
        .with_curve(self.config.curve)
        .with_method(self.method(request))
    }

    fn method(&self, request: &ComputeRequest) -> SimilarityMethod {
        request.similarity.unwrap_or(self.config.similarity)
    }
}

fn create_output_dir(dir: &Path) -> ComputeResult<()> {
    fs::create_dir_all(dir).map_err(|source| {
        SynthError::io_system(
            "IO.OUTPUT_DIRECTORY",
            format!(
                "failed to create output directory '{}': {}",
                dir.display(),
                source
            ),
        )
    })
}

fn write_artifact(
    request: &ComputeRequest,
    relative_path: &str,
    content: &str,
) -> ComputeResult<ComputeArtifact> {
    let output_path = request.output_dir.join(relative_path);
    if let Some(parent) = output_path.parent() {
        create_output_dir(parent)?;
    }
    write_text_artifact(&output_path, content).map_err(|source| {
        SynthError::io_system(
            "IO.OUTPUT_WRITE",
            format!(
                "failed to write artifact '{}': {}",
                output_path.display(),
                source
            ),
        )
    })?;
    Ok(ComputeArtifact::new(relative_path))
}

fn write_json(
    request: &ComputeRequest,
    relative_path: &str,
    value: &impl Serialize,
) -> ComputeResult<ComputeArtifact> {
    let output_path = request.output_dir.join(relative_path);
    write_json_artifact(&output_path, value).map_err(|source| {
        SynthError::io_system(
            "IO.OUTPUT_WRITE",
            format!(
                "failed to write artifact '{}': {}",
                output_path.display(),
                source
            ),
        )
    })?;
    Ok(ComputeArtifact::new(relative_path))
}

fn check_module(request: &ComputeRequest, expected: ComputeModule) -> ComputeResult<()> {
    if request.module != expected {
        return Err(SynthError::input_validation(
            "INPUT.MODULE_MISMATCH",
            format!(
                "{} executor received a request for module {}",
                expected, request.module
            ),
        ));
    }
    Ok(())
}

/// Broadened curves and stick spectra for every stage at one temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadenModule;

impl ModuleExecutor for BroadenModule {
    fn execute(&self, request: &ComputeRequest) -> ComputeResult<Vec<ComputeArtifact>> {
        check_module(request, ComputeModule::Broaden)?;
        let temperature = request.require_temperature()?;
        let project = LoadedProject::load(request)?;
        let inputs = project.inputs(request);
        create_output_dir(&request.output_dir)?;

        let stage_spectra = inputs.broaden_stages(temperature)?;
        let mut artifacts = Vec::new();
        for (ion, spectrum) in &stage_spectra {
            if spectrum.is_zero() {
                warn!(ion, "stage has no lines in the window");
            }
            artifacts.push(write_artifact(
                request,
                &broadened_artifact_name(*ion),
                &render_stage_spectrum(spectrum),
            )?);
        }

        for (ion, lines) in &project.stage_lines {
            let sticks = stick_spectrum(lines, &inputs.window);
            artifacts.push(write_artifact(
                request,
                &sticks_artifact_name(*ion),
                &render_sticks(&sticks),
            )?);

            if request.transition_groups {
                let broadening =
                    BroadeningRequest::new(*ion, temperature, inputs.window, inputs.axis.clone())
                        .with_wavelength_shift(inputs.wavelength_shift);
                let groups = project.engine.broaden_by_transition_group(lines, &broadening)?;
                for (pair, spectrum) in &groups {
                    artifacts.push(write_artifact(
                        request,
                        &group_artifact_name(*ion, *pair),
                        &render_stage_spectrum(spectrum),
                    )?);
                }
            }
        }

        info!(temperature, artifacts = artifacts.len(), "broadening finished");
        Ok(artifacts)
    }
}

/// Stage fractions at one plasma point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbundanceModule;

impl ModuleExecutor for AbundanceModule {
    fn execute(&self, request: &ComputeRequest) -> ComputeResult<Vec<ComputeArtifact>> {
        check_module(request, ComputeModule::Abundance)?;
        let point = request.require_point()?;
        let config = ProjectConfig::load(&request.config_path)?;
        let atom = config.atomic_structure()?;
        create_output_dir(&request.output_dir)?;

        let (abundances, average_ionization) = match config.abundance_strategy {
            AbundanceStrategyKind::IterativeChain => {
                let solution =
                    IterativeChain.solve(&atom, point.temperature, point.electron_density)?;
                (solution.abundances, Some(solution.average_ionization))
            }
            kind => (
                kind.strategy()
                    .abundances(&atom, point.temperature, point.electron_density)?,
                None,
            ),
        };
        info!(
            temperature = point.temperature,
            electron_density = point.electron_density,
            dominant = ?abundances.dominant_stage(),
            "abundances computed"
        );

        let artifact = write_artifact(
            request,
            ABUNDANCE_ARTIFACT,
            &render_abundances(
                config.abundance_strategy.as_str(),
                point,
                &abundances,
                average_ionization,
            ),
        )?;
        Ok(vec![artifact])
    }
}

/// Synthetic spectrum at one plasma point, annotated with every similarity
/// metric against the measured spectrum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesizeModule;

impl ModuleExecutor for SynthesizeModule {
    fn execute(&self, request: &ComputeRequest) -> ComputeResult<Vec<ComputeArtifact>> {
        check_module(request, ComputeModule::Synthesize)?;
        let point = request.require_point()?;
        let project = LoadedProject::load(request)?;
        let inputs = project.inputs(request);
        create_output_dir(&request.output_dir)?;

        let stage_spectra = inputs.broaden_stages(point.temperature)?;
        let abundances =
            inputs
                .strategy
                .abundances(inputs.atom, point.temperature, point.electron_density)?;
        let axis = stage_spectra
            .values()
            .next()
            .map(|spectrum| spectrum.wavelengths.as_slice())
            .unwrap_or_default();
        let synthetic = synthesize(&stage_spectra, &abundances, axis, inputs.curve)?;

        // A metric that cannot be evaluated is reported as NaN rather than
        // discarding the spectrum.
        let scores: Vec<(SimilarityMethod, Option<f64>)> = SimilarityMethod::ALL
            .iter()
            .map(|method| {
                let value = score(inputs.experimental, &synthetic, *method)
                    .map_err(|error| warn!(method = %method, %error, "metric unavailable"))
                    .ok();
                (*method, value)
            })
            .collect();
        if let Some((_, value)) = scores.iter().find(|(method, _)| *method == inputs.method) {
            info!(method = %inputs.method, score = ?value, "synthesis finished");
        }

        let artifact = write_artifact(
            request,
            SYNTHETIC_ARTIFACT,
            &render_synthetic(point, &synthetic, &scores),
        )?;
        Ok(vec![artifact])
    }
}

/// Full grid scan: score matrix table plus a JSON report.
#[derive(Clone, Copy)]
pub struct ScanModule<'a> {
    progress: &'a dyn ScanProgress,
}

impl Default for ScanModule<'_> {
    fn default() -> Self {
        Self {
            progress: &NoProgress,
        }
    }
}

impl<'a> ScanModule<'a> {
    pub fn with_progress(progress: &'a dyn ScanProgress) -> Self {
        Self { progress }
    }
}

impl ModuleExecutor for ScanModule<'_> {
    fn execute(&self, request: &ComputeRequest) -> ComputeResult<Vec<ComputeArtifact>> {
        check_module(request, ComputeModule::Scan)?;
        let project = LoadedProject::load(request)?;
        let grid = project.config.scan_grid()?;
        let workers = request.workers.unwrap_or_else(|| project.config.workers());
        let inputs = project.inputs(request);
        create_output_dir(&request.output_dir)?;

        let scanner = GridScanner::new(workers);
        let matrix = scanner.scan(&grid, &inputs, self.progress)?;
        if !matrix.failures.is_empty() {
            warn!(
                failed = matrix.failures.len(),
                total = grid.len(),
                "some grid cells could not be evaluated"
            );
        }

        let report = ScanReport::new(project.config.abundance_strategy.as_str(), &matrix);
        let table = write_artifact(request, SCORE_MATRIX_ARTIFACT, &render_score_matrix(&matrix))?;
        let json = write_json(request, SCAN_REPORT_ARTIFACT, &report)?;
        Ok(vec![table, json])
    }
}

/// Runs the executor matching `request.module`; `progress` only matters for
/// scans.
pub fn execute_module(
    request: &ComputeRequest,
    progress: &dyn ScanProgress,
) -> ComputeResult<Vec<ComputeArtifact>> {
    match request.module {
        ComputeModule::Broaden => BroadenModule.execute(request),
        ComputeModule::Abundance => AbundanceModule.execute(request),
        ComputeModule::Synthesize => SynthesizeModule.execute(request),
        ComputeModule::Scan => ScanModule::with_progress(progress).execute(request),
    }
}
