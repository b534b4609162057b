//! Scan command implementation

use colored::Colorize;
use drift_core::{
    ChangeCounts, ChangeSetCategory, DirectoryId, DriftMonitor, FsWalker, ScanReport, SkippedPath,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::output::{counts, print_entries, print_json};
use crate::error::{CliError, Result};

/// Machine-readable result of one directory scan.
#[derive(Debug, Serialize)]
struct ScanSummary {
    directory: DirectoryId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<ChangeSetCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<ChangeCounts>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<SkippedPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ScanSummary {
    fn new(name: String, directory: DirectoryId, result: &drift_core::Result<ScanReport>) -> Self {
        match result {
            Ok(report) => Self {
                directory,
                name,
                version: Some(report.change_set.version()),
                category: Some(report.change_set.category()),
                counts: Some(report.change_set.counts()),
                skipped: report.skipped.clone(),
                error: None,
            },
            Err(e) => Self {
                directory,
                name,
                version: None,
                category: None,
                counts: None,
                skipped: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

fn walker(monitor: &DriftMonitor) -> FsWalker {
    FsWalker::from_config(&monitor.config().store)
}

/// Run the scan command for one directory
pub fn run_scan(monitor: &DriftMonitor, target: &str, json: bool) -> Result<()> {
    let directory = monitor.resolve(target)?;
    let report = monitor.scan(directory.id, &walker(monitor), &CancellationToken::new())?;

    if json {
        return print_json(&ScanSummary::new(directory.name, directory.id, &Ok(report)));
    }
    print_report(&directory.name, &report);
    Ok(())
}

/// Run the scan command for every monitored directory
pub fn run_scan_all(monitor: &DriftMonitor, json: bool) -> Result<()> {
    let names: std::collections::HashMap<DirectoryId, String> =
        monitor.directories().into_iter().map(|d| (d.id, d.name)).collect();
    if names.is_empty() && !json {
        println!("{} (use {} to add)", "No monitored directories".dimmed(), "drift register".cyan());
        return Ok(());
    }

    let cycle = monitor.run_cycle(&walker(monitor), &CancellationToken::new());
    let failed = cycle.iter().filter(|(_, result)| result.is_err()).count();

    if json {
        let summaries: Vec<ScanSummary> = cycle
            .iter()
            .map(|(id, result)| {
                let name = names.get(id).cloned().unwrap_or_else(|| id.to_string());
                ScanSummary::new(name, *id, result)
            })
            .collect();
        print_json(&summaries)?;
    } else {
        for (id, result) in &cycle {
            let name = names.get(id).cloned().unwrap_or_else(|| id.to_string());
            match result {
                Ok(report) => print_report(&name, report),
                Err(e) => println!("{} {}: {}", "ERROR".red().bold(), name.cyan(), e),
            }
        }
    }

    if failed > 0 {
        return Err(CliError::user(format!("{failed} of {} scans failed", cycle.len())));
    }
    Ok(())
}

fn print_report(name: &str, report: &ScanReport) {
    let change_set = &report.change_set;
    println!(
        "{} {}: version {} ({}) {}",
        "OK".green().bold(),
        name.cyan(),
        change_set.version(),
        change_set.category(),
        counts(change_set.counts())
    );
    print_entries(change_set.entries());
    for skipped in &report.skipped {
        println!("   {} {} ({})", "!".yellow(), skipped.path, skipped.reason);
    }
}
