//! Configuration drift detection
//!
//! Snapshots the files of monitored directories, diffs successive snapshots
//! and keeps the results as a gapless, versioned chain of change sets per
//! directory.
//!
//! # Data flow
//!
//! ```text
//! FileWalker -> SnapshotScanner -> Snapshot -> diff (against materialized state)
//!            -> ChangeSetChain::commit -> ChangeSetSink -> QueryFacade
//! ```
//!
//! File bodies are interned once per fingerprint in the shared
//! [`FileRecordStore`]; change sets only hold references to them.

pub mod chain;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod model;
pub mod monitor;
pub mod persist;
pub mod query;
pub mod scan;
pub mod store;

pub use chain::{ChainStatus, ChangeSetChain, CommitGuard, History, PurgeReport, accept_all};
pub use config::{CommitConfig, DriftConfig, ScanConfig, StoreConfig};
pub use diff::{SnapshotComparison, compare, diff};
pub use error::{Error, Result};
pub use filter::{AcceptAll, DirectoryFilter, FilterRule, PathFilter};
pub use model::{
    ChangeCounts, ChangeSet, ChangeSetCategory, ChangeSetId, DirectoryId, DriftCategory, DriftEntry, FileRecord,
    MonitoredDirectory,
};
pub use monitor::{CycleReport, DriftMonitor, ScanReport};
pub use persist::{Archive, ChangeSetSink, NullSink};
pub use query::{DriftCriteria, QueryFacade, VersionSummary, VersionedEntry};
pub use scan::{
    FeedWalker, FileWalker, FsWalker, ScanOutcome, SkipReason, SkippedPath, Snapshot, SnapshotScanner, WalkContent,
    WalkEntry,
};
pub use store::{CollectStats, FileRecordStore, PinSet};
