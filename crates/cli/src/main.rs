// mineflow CLI - mineral flow diagrams from production and trade tables

mod exit_codes;
mod flow;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "mflow")]
#[command(about = "Reconcile mineral production with trade and lay out the flow diagram")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the flow diagram described by a TOML config file
    #[command(after_help = "\
Examples:
  mflow run lithium.flow.toml
  mflow run lithium.flow.toml --json
  mflow run lithium.flow.toml --output diagram.json
  RUST_LOG=mineflow=debug mflow run lithium.flow.toml --json")]
    Run {
        /// Path to the .flow.toml config file
        config: PathBuf,

        /// Output the diagram JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the diagram JSON to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a flow config without loading its inputs
    #[command(after_help = "\
Examples:
  mflow validate lithium.flow.toml")]
    Validate {
        /// Path to the .flow.toml config file
        config: PathBuf,
    },

    /// Print per-stage totals and trade deficits
    #[command(after_help = "\
Examples:
  mflow inspect lithium.flow.toml
  mflow inspect lithium.flow.toml --json
  mflow inspect lithium.flow.toml --legend")]
    Inspect {
        /// Path to the .flow.toml config file
        config: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Append the accounting category legend
        #[arg(long)]
        legend: bool,
    },

    /// Look up location ids by name in the config's names table
    #[command(after_help = "\
Examples:
  mflow names lithium.flow.toml chi
  mflow names lithium.flow.toml Korea --json")]
    Names {
        /// Path to the .flow.toml config file
        config: PathBuf,

        /// Case-insensitive substring of the location name
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  mineflow ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Diagnostics go to stderr so `--json` stdout stays a single value.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Run { config, json, output } => flow::cmd_run(config, json, output),
        Commands::Validate { config } => flow::cmd_validate(config),
        Commands::Inspect { config, json, legend } => flow::cmd_inspect(config, json, legend),
        Commands::Names { config, query, json } => flow::cmd_names(config, &query, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
