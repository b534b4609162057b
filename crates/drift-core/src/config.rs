//! Drift configuration (`drift.toml`)
//!
//! ```toml
//! [store]
//! retain_content = false
//! max_retained_bytes = 1048576
//!
//! [commit]
//! initial_retry_ms = 50
//! max_retry_ms = 1000
//! max_elapsed_ms = 10000
//!
//! [scan]
//! workers = 4
//! ```

use crate::Result;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use drift_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// File name of the configuration inside a state directory
pub const CONFIG_FILE: &str = "drift.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl DriftConfig {
    /// Load `drift.toml` from `state_dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load(state_dir: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load_or_default(&state_dir.join(CONFIG_FILE))?)
    }

    pub fn save(&self, state_dir: &NormalizedPath) -> Result<()> {
        Ok(ConfigStore::new().save(&state_dir.join(CONFIG_FILE), self)?)
    }
}

/// FileRecordStore retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Keep file bodies in memory alongside their fingerprints
    #[serde(default)]
    pub retain_content: bool,
    /// Bodies larger than this are fingerprinted but never retained
    #[serde(default = "default_max_retained_bytes")]
    pub max_retained_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retain_content: false,
            max_retained_bytes: default_max_retained_bytes(),
        }
    }
}

fn default_max_retained_bytes() -> u64 {
    1024 * 1024
}

/// Retry policy for commits rejected as busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitConfig {
    #[serde(default = "default_initial_retry_ms")]
    pub initial_retry_ms: u64,
    #[serde(default = "default_max_retry_ms")]
    pub max_retry_ms: u64,
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

impl CommitConfig {
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_retry_ms))
            .with_max_interval(Duration::from_millis(self.max_retry_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(self.max_elapsed_ms)))
            .build()
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            initial_retry_ms: default_initial_retry_ms(),
            max_retry_ms: default_max_retry_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

fn default_initial_retry_ms() -> u64 {
    50
}

fn default_max_retry_ms() -> u64 {
    1000
}

fn default_max_elapsed_ms() -> u64 {
    10_000
}

/// Scan cycle tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Upper bound on directories scanned at once during a cycle
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}
