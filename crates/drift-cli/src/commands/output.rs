//! Shared terminal rendering

use colored::{ColoredString, Colorize};
use drift_core::{ChangeCounts, DirectoryId, DriftCategory, DriftEntry, DriftMonitor};
use serde::Serialize;

use crate::error::{CliError, Result};

pub(crate) fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn marker(category: DriftCategory) -> ColoredString {
    match category {
        DriftCategory::Added => "+".green(),
        DriftCategory::Changed => "~".yellow(),
        DriftCategory::Removed => "-".red(),
    }
}

pub(crate) fn print_entries(entries: &[DriftEntry]) {
    for entry in entries {
        println!("   {} {}", marker(entry.category()), entry.path());
    }
}

pub(crate) fn counts(counts: ChangeCounts) -> String {
    format!(
        "{} {} {}",
        format!("+{}", counts.added).green(),
        format!("~{}", counts.changed).yellow(),
        format!("-{}", counts.removed).red()
    )
}

/// Latest version of a chain, refusing chains with nothing committed.
pub(crate) fn latest_version(monitor: &DriftMonitor, id: DirectoryId, name: &str) -> Result<u32> {
    match monitor.chain().latest_version(id)? {
        0 => Err(CliError::user(format!(
            "No change sets recorded for '{name}'. Run 'drift scan {name}' first."
        ))),
        latest => Ok(latest),
    }
}
