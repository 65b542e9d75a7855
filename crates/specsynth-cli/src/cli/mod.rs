mod commands;
mod progress;

use clap::Parser;
use specsynth_core::domain::SynthError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let synth_error = error.as_synth_error();
            eprintln!("{}", synth_error.diagnostic_line());
            eprintln!("{}", synth_error.fatal_exit_line());
            synth_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// Logs go to stderr so artifact summaries on stdout stay parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "specsynth",
    version,
    about = "Synthetic plasma emission spectra and temperature/density grid scans"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Broaden every stage line list at one temperature
    Broaden(commands::BroadenArgs),
    /// Compute ionization stage fractions at one plasma point
    Abundance(commands::PointArgs),
    /// Build the synthetic spectrum at one plasma point and score it
    Synthesize(commands::SynthesizeArgs),
    /// Scan the project's temperature/density grid
    Scan(commands::ScanArgs),
    /// Print the ground-state electron configuration of an ion
    Configuration(commands::ConfigurationArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Broaden(args) => commands::run_broaden_command(args),
        CliCommand::Abundance(args) => commands::run_abundance_command(args),
        CliCommand::Synthesize(args) => commands::run_synthesize_command(args),
        CliCommand::Scan(args) => commands::run_scan_command(args),
        CliCommand::Configuration(args) => commands::run_configuration_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(SynthError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_synth_error(&self) -> SynthError {
        match self {
            Self::Usage(message) => {
                SynthError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => SynthError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<SynthError> for CliError {
    fn from(error: SynthError) -> Self {
        Self::Compute(error)
    }
}
