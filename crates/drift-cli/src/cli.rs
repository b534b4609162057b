//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Drift - Track configuration drift in monitored directories
#[derive(Parser, Debug)]
#[command(name = "drift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// State directory holding the registry and archived change sets
    #[arg(long, global = true, env = "DRIFT_STATE_DIR", value_name = "DIR")]
    pub state: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start monitoring a directory
    ///
    /// Filters use `dir:glob` relative to the base directory; a bare glob
    /// applies to the whole tree.
    ///
    /// Examples:
    ///   drift register conf /srv/app/conf
    ///   drift register conf /srv/app/conf -i '*.xml' -e 'tmp:'
    Register {
        /// Unique name of the monitored directory
        name: String,

        /// Base directory to monitor
        base: PathBuf,

        /// Managed resource owning the directory
        #[arg(short, long, default_value = "localhost")]
        resource: String,

        /// Include filter (repeatable)
        #[arg(short, long)]
        include: Vec<String>,

        /// Exclude filter (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Stop monitoring a directory whose history has been purged
    Unregister {
        /// Name or id of the monitored directory
        directory: String,
    },

    /// List monitored directories
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Scan directories and record drift
    Scan {
        /// Name or id of the monitored directory
        #[arg(required_unless_present = "all")]
        directory: Option<String>,

        /// Scan every monitored directory
        #[arg(long, conflicts_with = "directory")]
        all: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show chain status of monitored directories
    Status {
        /// Restrict to one directory
        directory: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the change-set history of a directory
    History {
        /// Name or id of the monitored directory
        directory: String,

        /// Only show entries touching this path
        #[arg(long)]
        path: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show net drift between two versions
    ///
    /// Version 0 is the empty baseline; `--to` defaults to the latest version.
    Diff {
        /// Name or id of the monitored directory
        directory: String,

        /// Older version
        #[arg(long, default_value_t = 0)]
        from: u32,

        /// Newer version
        #[arg(long)]
        to: Option<u32>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Compare two materialized states
    ///
    /// Targets are `NAME[@VERSION]`; without a version the latest is used.
    ///
    /// Examples:
    ///   drift compare conf@1 conf@4
    ///   drift compare web-a web-b
    Compare {
        /// Left target
        left: String,

        /// Right target
        right: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Drop the newest versions of a chain, down to and including `--through`
    Purge {
        /// Name or id of the monitored directory
        directory: String,

        /// Oldest version to remove
        #[arg(long)]
        through: u32,
    },

    /// Reclaim file records no change set references
    Gc,

    /// Write a change set in the agent file format
    Export {
        /// Name or id of the monitored directory
        directory: String,

        /// Version to export (defaults to the latest)
        #[arg(long)]
        version: Option<u32>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
