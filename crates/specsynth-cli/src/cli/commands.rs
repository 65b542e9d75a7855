use super::CliError;
use super::progress::ScanProgressBar;
use specsynth_core::common::elements::atomic_number_for_symbol;
use specsynth_core::domain::{
    ComputeArtifact, ComputeModule, ComputeRequest, PlasmaPoint, SimilarityMethod,
};
use specsynth_core::modules::atomic::ElectronConfiguration;
use specsynth_core::modules::execute_module;
use specsynth_core::modules::grid_scan::NoProgress;
use std::path::PathBuf;
use tracing::debug;

#[derive(clap::Args)]
pub(super) struct ProjectArgs {
    /// Project file describing the element, line lists and measured spectrum
    #[arg(long, default_value = "project.json")]
    project: PathBuf,

    /// Directory the artifacts are written into
    #[arg(long, default_value = "out")]
    output: PathBuf,
}

impl ProjectArgs {
    fn request(&self, module: ComputeModule) -> ComputeRequest {
        ComputeRequest::new(module, &self.project, &self.output)
    }
}

#[derive(clap::Args)]
pub(super) struct BroadenArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Plasma temperature in eV
    #[arg(long)]
    temperature: f64,

    /// Also write one spectrum per (lower, upper) level pair
    #[arg(long)]
    groups: bool,
}

#[derive(clap::Args)]
pub(super) struct PointArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Plasma temperature in eV
    #[arg(long)]
    temperature: f64,

    /// Electron density
    #[arg(long)]
    density: f64,
}

impl PointArgs {
    fn request(&self, module: ComputeModule) -> ComputeRequest {
        self.project
            .request(module)
            .with_point(PlasmaPoint::new(self.temperature, self.density))
    }
}

#[derive(clap::Args)]
pub(super) struct SynthesizeArgs {
    #[command(flatten)]
    point: PointArgs,

    /// Metric logged as the headline score (all metrics are written)
    #[arg(long)]
    similarity: Option<SimilarityMethod>,
}

#[derive(clap::Args)]
pub(super) struct ScanArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Worker threads (default: available cores minus one)
    #[arg(long)]
    workers: Option<usize>,

    /// Similarity metric used to fill the score matrix
    #[arg(long)]
    similarity: Option<SimilarityMethod>,

    /// Do not draw a progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(clap::Args)]
pub(super) struct ConfigurationArgs {
    /// Atomic number or element symbol
    #[arg(long)]
    element: String,

    /// Ionization stage (0 for the neutral atom)
    #[arg(long, default_value_t = 0)]
    stage: usize,

    /// Also list the occupation of every subshell
    #[arg(long)]
    subshells: bool,
}

pub(super) fn run_broaden_command(args: BroadenArgs) -> Result<i32, CliError> {
    let request = args
        .project
        .request(ComputeModule::Broaden)
        .with_temperature(args.temperature)
        .with_transition_groups(args.groups);
    run_module(&request)
}

pub(super) fn run_abundance_command(args: PointArgs) -> Result<i32, CliError> {
    run_module(&args.request(ComputeModule::Abundance))
}

pub(super) fn run_synthesize_command(args: SynthesizeArgs) -> Result<i32, CliError> {
    let mut request = args.point.request(ComputeModule::Synthesize);
    if let Some(similarity) = args.similarity {
        request = request.with_similarity(similarity);
    }
    run_module(&request)
}

pub(super) fn run_scan_command(args: ScanArgs) -> Result<i32, CliError> {
    if args.workers == Some(0) {
        return Err(CliError::Usage(
            "Invalid worker count '0'; expected a positive integer.".to_string(),
        ));
    }

    let mut request = args.project.request(ComputeModule::Scan);
    if let Some(workers) = args.workers {
        request = request.with_workers(workers);
    }
    if let Some(similarity) = args.similarity {
        request = request.with_similarity(similarity);
    }

    let progress = if args.quiet {
        ScanProgressBar::hidden()
    } else {
        ScanProgressBar::new()?
    };
    debug!(?request, "dispatching scan");
    println!("Running {}...", request.module);
    let artifacts = execute_module(&request, &progress)?;
    progress.finish("done");
    report_artifacts(&request, &artifacts);
    Ok(0)
}

pub(super) fn run_configuration_command(args: ConfigurationArgs) -> Result<i32, CliError> {
    let element = args.element.trim();
    let atomic_number = element
        .parse::<usize>()
        .ok()
        .or_else(|| atomic_number_for_symbol(element))
        .ok_or_else(|| {
            CliError::Usage(format!(
                "Unknown element '{element}'; expected an atomic number or a symbol such as Al."
            ))
        })?;

    let configuration = ElectronConfiguration::ground_state(atomic_number, args.stage)
        .map_err(|error| CliError::Compute(error.into()))?;
    println!("{configuration}");
    if args.subshells {
        for (label, electrons) in configuration.arrangement() {
            println!("  {label:<4} {electrons:>2}");
        }
    }
    Ok(0)
}

fn run_module(request: &ComputeRequest) -> Result<i32, CliError> {
    debug!(?request, "dispatching module");
    println!("Running {}...", request.module);
    let artifacts = execute_module(request, &NoProgress)?;
    report_artifacts(request, &artifacts);
    Ok(0)
}

fn report_artifacts(request: &ComputeRequest, artifacts: &[ComputeArtifact]) {
    println!(
        "{} completed ({} artifacts in '{}').",
        request.module,
        artifacts.len(),
        request.output_dir.display()
    );
    for artifact in artifacts {
        println!("  {}", artifact.relative_path.display());
    }
}
