//! Drift CLI
//!
//! The command-line interface for registering monitored directories,
//! scanning them and inspecting their change-set history.

mod cli;
mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use drift_core::DriftMonitor;
use drift_fs::NormalizedPath;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use error::{CliError, Result};

const STATE_DIR_NAME: &str = "drift";

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("{} configuration drift detection", "drift".green().bold());
        println!();
        println!("Run {} for available commands.", "drift --help".cyan());
        return Ok(());
    };

    let state_dir = resolve_state_dir(cli.state)?;
    tracing::debug!(state = %state_dir.display(), "Using state directory");
    let monitor = DriftMonitor::open(NormalizedPath::new(&state_dir))?;
    execute_command(&monitor, command)
}

fn init_tracing(verbose: bool) {
    let result = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    if let Err(e) = result {
        eprintln!("{}: failed to set tracing subscriber: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!("Verbose mode enabled");
}

fn resolve_state_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(std::path::absolute(dir)?);
    }
    dirs::data_dir()
        .map(|dir| dir.join(STATE_DIR_NAME))
        .ok_or_else(|| CliError::user("No data directory available; pass --state or set DRIFT_STATE_DIR"))
}

fn execute_command(monitor: &DriftMonitor, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Register {
            name,
            base,
            resource,
            include,
            exclude,
        } => commands::run_register(monitor, &name, &base, &resource, &include, &exclude),
        Commands::Unregister { directory } => commands::run_unregister(monitor, &directory),
        Commands::List { json } => commands::run_list(monitor, json),
        Commands::Scan { directory, json, .. } => match directory {
            Some(directory) => commands::run_scan(monitor, &directory, json),
            None => commands::run_scan_all(monitor, json),
        },
        Commands::Status { directory, json } => commands::run_status(monitor, directory.as_deref(), json),
        Commands::History { directory, path, json } => {
            commands::run_history(monitor, &directory, path.as_deref(), json)
        }
        Commands::Diff {
            directory,
            from,
            to,
            json,
        } => commands::run_diff(monitor, &directory, from, to, json),
        Commands::Compare { left, right, json } => commands::run_compare(monitor, &left, &right, json),
        Commands::Purge { directory, through } => commands::run_purge(monitor, &directory, through),
        Commands::Gc => commands::run_gc(monitor),
        Commands::Export {
            directory,
            version,
            output,
        } => commands::run_export(monitor, &directory, version, output.as_deref()),
    }
}
