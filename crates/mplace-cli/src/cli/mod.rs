mod commands;
mod helpers;

use clap::Parser;
use mplace_core::domain::MplaceError;
use mplace_core::parser::ValidationReport;

pub fn run_from_env() -> i32 {
    helpers::init_tracing();
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            if let CliError::Validation(report) = &error {
                eprintln!("{}", report.render());
            }
            let diagnostic = error.as_mplace_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "mplace", version, about = "Microplate layout input validation and visualization")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Validate materials and write the solver data file
    Generate(commands::GenerateArgs),
    /// Print plate size and control names of a data file as JSON
    Scan(commands::ScanArgs),
    /// Cut the layout CSV block out of raw solver output
    Extract(commands::ExtractArgs),
    /// Print per-well render markers for a solved layout as JSON
    Markers(commands::MarkersArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Generate(args) => commands::run_generate_command(args),
        CliCommand::Scan(args) => commands::run_scan_command(args),
        CliCommand::Extract(args) => commands::run_extract_command(args),
        CliCommand::Markers(args) => commands::run_markers_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Validation(ValidationReport),
    #[error("{0}")]
    Compute(MplaceError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_mplace_error(&self) -> MplaceError {
        match self {
            Self::Usage(message) => MplaceError::schema("INPUT.CLI_USAGE", message.trim_end()),
            Self::Validation(report) => MplaceError::schema("INPUT.VALIDATION", report.to_string()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => MplaceError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<MplaceError> for CliError {
    fn from(error: MplaceError) -> Self {
        Self::Compute(error)
    }
}
