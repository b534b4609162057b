//! Purge and garbage collection

use colored::Colorize;
use drift_core::{CollectStats, DriftMonitor};

use crate::error::Result;

/// Run the purge command
pub fn run_purge(monitor: &DriftMonitor, target: &str, through: u32) -> Result<()> {
    let directory = monitor.resolve(target)?;
    let report = monitor.purge(directory.id, through)?;
    let stats = monitor.collect_garbage();

    let removed: Vec<String> = report.removed.iter().rev().map(|v| format!("v{v}")).collect();
    println!(
        "{} Purged {} of {}",
        "OK".green().bold(),
        removed.join(", "),
        directory.name.cyan()
    );
    if report.latest == 0 {
        println!("   {} no versions remain", "-".red());
    } else {
        println!("   latest version is now v{}", report.latest);
    }
    println!("   released {} record references", report.released);
    print_stats(stats);
    Ok(())
}

/// Run the gc command
pub fn run_gc(monitor: &DriftMonitor) -> Result<()> {
    let stats = monitor.collect_garbage();
    println!("{} Garbage collection complete", "OK".green().bold());
    print_stats(stats);
    println!(
        "   {} records retained ({} content bytes)",
        monitor.store().len(),
        monitor.store().retained_bytes()
    );
    Ok(())
}

fn print_stats(stats: CollectStats) {
    if stats.removed == 0 {
        println!("   {}", "no unreferenced records".dimmed());
    } else {
        println!("   reclaimed {} records ({} bytes)", stats.removed, stats.bytes_freed);
    }
}
