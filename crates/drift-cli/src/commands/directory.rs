//! Registry commands: register, unregister, list

use std::path::Path;

use colored::Colorize;
use drift_core::{ChainStatus, DirectoryFilter, DriftMonitor, FilterRule, MonitoredDirectory};
use drift_fs::NormalizedPath;

use super::output::print_json;
use crate::error::{CliError, Result};

/// Run the register command
pub fn run_register(
    monitor: &DriftMonitor,
    name: &str,
    base: &Path,
    resource: &str,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let base = std::path::absolute(base)?;
    if !base.is_dir() {
        return Err(CliError::user(format!("Base directory '{}' does not exist", base.display())));
    }

    let includes = parse_rules(include)?;
    let excludes = parse_rules(exclude)?;
    let directory = MonitoredDirectory::new(name, resource, NormalizedPath::new(&base))?
        .with_filter(DirectoryFilter::new(includes, excludes));
    let id = monitor.register(directory)?;

    println!("{} Registered {} ({})", "OK".green().bold(), name.cyan(), id.to_string().dimmed());
    println!("Run {} to record its coverage.", format!("drift scan {name}").cyan());
    Ok(())
}

fn parse_rules(specs: &[String]) -> Result<Vec<FilterRule>> {
    specs
        .iter()
        .map(|spec| FilterRule::parse(spec).map_err(CliError::from))
        .collect()
}

/// Run the unregister command
pub fn run_unregister(monitor: &DriftMonitor, target: &str) -> Result<()> {
    let directory = monitor.resolve(target)?;
    match monitor.unregister(directory.id) {
        Ok(_) => {
            println!("{} Unregistered {}", "OK".green().bold(), directory.name.cyan());
            Ok(())
        }
        Err(drift_core::Error::DirectoryInUse { versions, .. }) => Err(CliError::user(format!(
            "'{}' still has {} change sets. Run 'drift purge {} --through 1' first.",
            directory.name, versions, directory.name
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Run the list command
pub fn run_list(monitor: &DriftMonitor, json: bool) -> Result<()> {
    let directories = monitor.directories();
    if json {
        return print_json(&directories);
    }

    if directories.is_empty() {
        println!("{} (use {} to add)", "No monitored directories".dimmed(), "drift register".cyan());
        return Ok(());
    }
    println!("{}", "Monitored Directories".bold());
    println!();
    for directory in &directories {
        let status = match monitor.chain().status(directory.id)? {
            ChainStatus::Uninitialized => "not scanned".yellow(),
            ChainStatus::Active { latest } => format!("v{latest}").green(),
        };
        println!(
            "  {} {} {} [{}] ({})",
            "+".green(),
            directory.name.cyan(),
            directory.base_path,
            directory.resource_id.dimmed(),
            status
        );
    }
    Ok(())
}
