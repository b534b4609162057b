//! Snapshot capture
//!
//! A [`FileWalker`] produces a lazy feed of [`WalkEntry`] values for a
//! directory; [`SnapshotScanner`] canonicalizes each path, interns the
//! content in the shared [`FileRecordStore`] and assembles a [`Snapshot`].
//! Files that cannot be captured are reported as [`SkippedPath`] without
//! failing the scan. Only an unreadable base aborts it.

mod fs_walker;
mod snapshot;

pub use fs_walker::FsWalker;
pub use snapshot::Snapshot;

use crate::model::MonitoredDirectory;
use crate::store::{FileRecordStore, PinSet};
use crate::{Error, Result};
use drift_fs::{Fingerprint, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Body of a walked file as delivered by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkContent {
    /// Raw bytes, fingerprinted by the scanner
    Bytes(Vec<u8>),
    /// Digest computed on the walker side
    Fingerprint(Fingerprint),
    /// Nothing could be read
    Unavailable,
}

/// One file reported by a walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Location relative to the base, or absolute under it
    pub path: String,
    pub len: u64,
    pub content: WalkContent,
    pub readable: bool,
}

impl WalkEntry {
    pub fn bytes(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            len: content.len() as u64,
            content: WalkContent::Bytes(content),
            readable: true,
        }
    }

    pub fn fingerprint(path: impl Into<String>, fingerprint: Fingerprint, len: u64) -> Self {
        Self {
            path: path.into(),
            len,
            content: WalkContent::Fingerprint(fingerprint),
            readable: true,
        }
    }

    pub fn unreadable(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            len: 0,
            content: WalkContent::Unavailable,
            readable: false,
        }
    }
}

/// Source of walk entries for a monitored directory's base path.
///
/// An `Err` means the base itself could not be read and fails the scan.
pub trait FileWalker: Send + Sync {
    fn walk<'a>(
        &'a self,
        base: &NormalizedPath,
    ) -> io::Result<Box<dyn Iterator<Item = WalkEntry> + Send + 'a>>;
}

/// Walker replaying a feed delivered by a remote agent.
#[derive(Debug, Clone, Default)]
pub struct FeedWalker {
    entries: Vec<WalkEntry>,
}

impl FeedWalker {
    pub fn new(entries: Vec<WalkEntry>) -> Self {
        Self { entries }
    }
}

impl FileWalker for FeedWalker {
    fn walk<'a>(
        &'a self,
        _base: &NormalizedPath,
    ) -> io::Result<Box<dyn Iterator<Item = WalkEntry> + Send + 'a>> {
        Ok(Box::new(self.entries.iter().cloned()))
    }
}

/// Why a walked file is missing from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `..` traversal or an absolute path outside the base
    EscapesBase,
    /// Empty or otherwise unusable path
    InvalidPath,
    /// Permission denied or vanished mid-walk
    Unreadable,
    /// Marked readable but delivered without bytes or digest
    MissingContent,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::EscapesBase => "path escapes the monitored directory",
            Self::InvalidPath => "invalid path",
            Self::Unreadable => "file is unreadable",
            Self::MissingContent => "no content was delivered",
        };
        f.write_str(text)
    }
}

/// Non-fatal report item for a file left out of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPath {
    pub path: String,
    pub reason: SkipReason,
}

/// Result of one scan.
///
/// The snapshot's records stay pinned in the store for as long as the
/// outcome is alive, so commit before dropping it.
#[derive(Debug)]
pub struct ScanOutcome {
    pub snapshot: Snapshot,
    pub skipped: Vec<SkippedPath>,
    pins: PinSet,
}

impl ScanOutcome {
    /// Number of interned records this outcome holds pinned.
    pub fn pinned(&self) -> usize {
        self.pins.len()
    }
}

/// Turns walk feeds into snapshots backed by the shared record store.
#[derive(Debug, Clone)]
pub struct SnapshotScanner {
    store: Arc<FileRecordStore>,
}

impl SnapshotScanner {
    pub fn new(store: Arc<FileRecordStore>) -> Self {
        Self { store }
    }

    /// Walk `directory` and capture a snapshot.
    ///
    /// # Errors
    ///
    /// - [`Error::Scan`] when the walker cannot read the base path
    /// - [`Error::Cancelled`] when `cancel` fires before the feed is drained
    pub fn scan(
        &self,
        directory: &MonitoredDirectory,
        walker: &dyn FileWalker,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let entries = walker.walk(&directory.base_path).map_err(|source| Error::Scan {
            directory: directory.id,
            base: directory.base_path.to_native(),
            source,
        })?;
        self.scan_entries(directory, entries, cancel)
    }

    /// Capture a snapshot from an already materialized feed.
    pub fn scan_entries(
        &self,
        directory: &MonitoredDirectory,
        entries: impl IntoIterator<Item = WalkEntry>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let mut snapshot = Snapshot::new(directory.id);
        let mut skipped = Vec::new();
        let mut pins = self.store.pin_set();

        for entry in entries {
            if cancel.is_cancelled() {
                debug!(directory = %directory.id, "Scan cancelled mid-feed");
                return Err(Error::Cancelled {
                    directory: directory.id,
                });
            }

            let path = match directory.base_path.relativize(&entry.path) {
                Ok(path) => path,
                Err(e) => {
                    let reason = match e {
                        drift_fs::Error::EscapesBase { .. } => SkipReason::EscapesBase,
                        _ => SkipReason::InvalidPath,
                    };
                    warn!(path = %entry.path, %reason, "Skipping walk entry");
                    skipped.push(SkippedPath {
                        path: entry.path,
                        reason,
                    });
                    continue;
                }
            };

            let record = match (entry.readable, entry.content) {
                (false, _) => None,
                (true, WalkContent::Bytes(bytes)) => Some(pins.intern(bytes)),
                (true, WalkContent::Fingerprint(fp)) => Some(pins.intern_fingerprint(fp, entry.len)),
                (true, WalkContent::Unavailable) => {
                    warn!(path = %path, "Walk entry carries no content");
                    skipped.push(SkippedPath {
                        path: path.to_string(),
                        reason: SkipReason::MissingContent,
                    });
                    continue;
                }
            };
            let Some(record) = record else {
                debug!(path = %path, "Skipping unreadable file");
                skipped.push(SkippedPath {
                    path: path.to_string(),
                    reason: SkipReason::Unreadable,
                });
                continue;
            };

            let shown = path.to_string();
            if snapshot.insert(path, record).is_some() {
                warn!(path = %shown, "Duplicate walk entry, keeping the last one");
            }
        }

        debug!(
            directory = %directory.id,
            files = snapshot.len(),
            skipped = skipped.len(),
            "Captured snapshot"
        );
        Ok(ScanOutcome {
            snapshot,
            skipped,
            pins,
        })
    }
}
