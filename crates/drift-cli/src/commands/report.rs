//! Read-only reports: status, history, diff, compare, export

use std::path::Path;

use colored::Colorize;
use drift_core::{ChainStatus, DirectoryId, DriftMonitor, MonitoredDirectory};
use drift_fs::{NormalizedPath, RelativePath};
use serde::Serialize;

use super::output::{counts, latest_version, marker, print_entries, print_json};
use crate::error::{CliError, Result};

#[derive(Debug, Serialize)]
struct StatusLine {
    id: DirectoryId,
    name: String,
    resource_id: String,
    base_path: String,
    #[serde(flatten)]
    status: ChainStatus,
}

/// Run the status command
pub fn run_status(monitor: &DriftMonitor, target: Option<&str>, json: bool) -> Result<()> {
    let directories = match target {
        Some(target) => vec![monitor.resolve(target)?],
        None => monitor.directories(),
    };
    let mut lines = Vec::with_capacity(directories.len());
    for directory in directories {
        let status = monitor.chain().status(directory.id)?;
        lines.push(StatusLine {
            id: directory.id,
            name: directory.name,
            resource_id: directory.resource_id,
            base_path: directory.base_path.to_string(),
            status,
        });
    }
    if json {
        return print_json(&lines);
    }

    println!("{}", "Drift Status".bold());
    println!();
    if let Some(state_dir) = monitor.state_dir() {
        println!("{}:  {}", "State".dimmed(), state_dir);
    }
    println!("{}: {} retained", "Records".dimmed(), monitor.store().len());
    println!();

    if lines.is_empty() {
        println!("  {} (use {} to add)", "None".dimmed(), "drift register".cyan());
        return Ok(());
    }
    for line in &lines {
        let status = match line.status {
            ChainStatus::Uninitialized => "uninitialized".yellow(),
            ChainStatus::Active { latest } => format!("active, latest v{latest}").green(),
        };
        println!("  {} {} {} ({})", "+".green(), line.name.cyan(), line.base_path, status);
    }
    Ok(())
}

/// Run the history command
pub fn run_history(monitor: &DriftMonitor, target: &str, path: Option<&str>, json: bool) -> Result<()> {
    let directory = monitor.resolve(target)?;
    let query = monitor.query();

    if let Some(path) = path {
        let path = RelativePath::parse(path)?;
        let history = query.file_history(directory.id, &path)?;
        if json {
            return print_json(&history);
        }
        println!("{} {} in {}", "History of".bold(), path, directory.name.cyan());
        if history.is_empty() {
            println!("   {}", "never changed".dimmed());
        }
        for versioned in &history {
            println!(
                "   v{:<4} {} {}",
                versioned.version,
                marker(versioned.entry.category()),
                versioned.entry.category()
            );
        }
        return Ok(());
    }

    let summary = query.summary(directory.id)?;
    if json {
        return print_json(&summary);
    }
    println!("{} {}", "History of".bold(), directory.name.cyan());
    if summary.is_empty() {
        println!("   {} (use {} to record one)", "No change sets".dimmed(), format!("drift scan {}", directory.name).cyan());
    }
    for version in &summary {
        println!(
            "   v{:<4} {:<8} {} {}",
            version.version,
            version.category,
            version.created_at.format("%Y-%m-%d %H:%M:%S"),
            counts(version.counts)
        );
    }
    Ok(())
}

/// Run the diff command
pub fn run_diff(monitor: &DriftMonitor, target: &str, from: u32, to: Option<u32>, json: bool) -> Result<()> {
    let directory = monitor.resolve(target)?;
    let to = match to {
        Some(to) => to,
        None => latest_version(monitor, directory.id, &directory.name)?,
    };
    let entries = monitor.query().diff_between(directory.id, from, to)?;
    if json {
        return print_json(&entries);
    }

    println!("{} {} v{} -> v{}", "Drift in".bold(), directory.name.cyan(), from, to);
    if entries.is_empty() {
        println!("{} No drift.", "OK".green().bold());
    } else {
        print_entries(&entries);
    }
    Ok(())
}

/// Split a `NAME[@VERSION]` compare target.
fn parse_target(target: &str) -> Result<(&str, Option<u32>)> {
    match target.rsplit_once('@') {
        Some((name, version)) => {
            let version = version
                .parse()
                .map_err(|_| CliError::user(format!("Invalid version in '{target}'")))?;
            Ok((name, Some(version)))
        }
        None => Ok((target, None)),
    }
}

fn resolve_target(monitor: &DriftMonitor, target: &str) -> Result<(MonitoredDirectory, u32)> {
    let (name, version) = parse_target(target)?;
    let directory = monitor.resolve(name)?;
    let version = match version {
        Some(version) => version,
        None => monitor.chain().latest_version(directory.id)?,
    };
    Ok((directory, version))
}

/// Run the compare command
pub fn run_compare(monitor: &DriftMonitor, left: &str, right: &str, json: bool) -> Result<()> {
    let (left_dir, left_version) = resolve_target(monitor, left)?;
    let (right_dir, right_version) = resolve_target(monitor, right)?;
    let report = monitor
        .query()
        .compare((left_dir.id, left_version), (right_dir.id, right_version))?;
    if json {
        return print_json(&report);
    }

    let left_label = format!("{}@{}", left_dir.name, left_version);
    let right_label = format!("{}@{}", right_dir.name, right_version);
    println!("{} {} {} {}", "Comparing".bold(), left_label.cyan(), "with".bold(), right_label.cyan());
    if report.is_identical() {
        println!("{} Identical.", "OK".green().bold());
        return Ok(());
    }
    for path in &report.not_in_right {
        println!("   {} {} (only in {})", "<".red(), path, left_label);
    }
    for path in &report.not_in_left {
        println!("   {} {} (only in {})", ">".green(), path, right_label);
    }
    for path in &report.in_conflict {
        println!("   {} {} (differs)", "~".yellow(), path);
    }
    Ok(())
}

/// Run the export command
pub fn run_export(monitor: &DriftMonitor, target: &str, version: Option<u32>, output: Option<&Path>) -> Result<()> {
    let directory = monitor.resolve(target)?;
    let version = match version {
        Some(version) => version,
        None => latest_version(monitor, directory.id, &directory.name)?,
    };
    let text = monitor.export_change_set(directory.id, version)?;

    match output {
        Some(path) => {
            let path = NormalizedPath::new(std::path::absolute(path)?);
            drift_fs::io::write_text(&path, &text)?;
            println!(
                "{} Exported {} v{} to {}",
                "OK".green().bold(),
                directory.name.cyan(),
                version,
                path
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}
