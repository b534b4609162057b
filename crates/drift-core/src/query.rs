//! Read-side queries over change-set chains

use crate::chain::ChangeSetChain;
use crate::diff::{SnapshotComparison, compare, diff};
use crate::filter::AcceptAll;
use crate::model::{ChangeCounts, ChangeSetCategory, ChangeSetId, DirectoryId, DriftCategory, DriftEntry};
use crate::scan::Snapshot;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use drift_fs::RelativePath;
use serde::Serialize;
use std::sync::Arc;

/// Entry selection for [`QueryFacade::find_entries`].
///
/// Every unset criterion matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftCriteria {
    pub categories: Vec<DriftCategory>,
    /// Parent directory of the entry, `"."` for the base
    pub directory: Option<String>,
    /// Also match entries in subdirectories of `directory`
    pub recursive: bool,
    pub path_contains: Option<String>,
    pub from_version: Option<u32>,
    pub to_version: Option<u32>,
}

impl DriftCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: DriftCategory) -> Self {
        self.categories.push(category);
        self
    }

    pub fn directory(mut self, directory: impl Into<String>, recursive: bool) -> Self {
        self.directory = Some(directory.into());
        self.recursive = recursive;
        self
    }

    pub fn path_contains(mut self, needle: impl Into<String>) -> Self {
        self.path_contains = Some(needle.into());
        self
    }

    pub fn versions(mut self, from: u32, to: u32) -> Self {
        self.from_version = Some(from);
        self.to_version = Some(to);
        self
    }

    fn admits_version(&self, version: u32) -> bool {
        self.from_version.is_none_or(|from| version >= from) && self.to_version.is_none_or(|to| version <= to)
    }

    fn matches(&self, entry: &DriftEntry) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&entry.category()) {
            return false;
        }
        if let Some(directory) = &self.directory {
            let scoped = if self.recursive {
                entry.path().is_within(directory)
            } else {
                entry.directory() == directory.trim_end_matches('/')
            };
            if !scoped {
                return false;
            }
        }
        self.path_contains
            .as_deref()
            .is_none_or(|needle| entry.path().as_str().contains(needle))
    }
}

/// An entry together with the version of the change set that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedEntry {
    pub version: u32,
    pub entry: DriftEntry,
}

/// One line of a chain overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSummary {
    pub id: ChangeSetId,
    pub version: u32,
    pub category: ChangeSetCategory,
    pub created_at: DateTime<Utc>,
    pub counts: ChangeCounts,
}

/// Query entry point shared by the CLI and the monitor.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    chain: Arc<ChangeSetChain>,
}

impl QueryFacade {
    pub fn new(chain: Arc<ChangeSetChain>) -> Self {
        Self { chain }
    }

    /// Net drift between two versions; version 0 is the empty baseline.
    ///
    /// Adjacent versions return the stored entries of `to`. Wider ranges are
    /// diffed between the two materialized states, so an add later removed
    /// cancels out and a chain of changes collapses into one entry from the
    /// oldest body to the newest.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRange`] when `from > to`
    /// - [`Error::VersionNotFound`] when `to` is past the latest version
    pub fn diff_between(&self, directory: DirectoryId, from: u32, to: u32) -> Result<Vec<DriftEntry>> {
        if from > to {
            return Err(Error::InvalidRange { directory, from, to });
        }
        let latest = self.chain.latest_version(directory)?;
        if to > latest {
            return Err(Error::VersionNotFound {
                directory,
                version: to,
                latest,
            });
        }
        if from == to {
            return Ok(Vec::new());
        }
        if to == from + 1 {
            return Ok(self.chain.change_set(directory, to)?.entries().to_vec());
        }
        let left = self.chain.snapshot_at(directory, from)?;
        let right = self.chain.snapshot_at(directory, to)?;
        Ok(diff(Some(&left), &right, &AcceptAll))
    }

    pub fn current_state(&self, directory: DirectoryId) -> Result<Snapshot> {
        self.chain.current_state(directory)
    }

    pub fn snapshot_at(&self, directory: DirectoryId, version: u32) -> Result<Snapshot> {
        self.chain.snapshot_at(directory, version)
    }

    /// Compare two materialized states, of the same or different directories.
    pub fn compare(&self, left: (DirectoryId, u32), right: (DirectoryId, u32)) -> Result<SnapshotComparison> {
        let left = self.chain.snapshot_at(left.0, left.1)?;
        let right = self.chain.snapshot_at(right.0, right.1)?;
        Ok(compare(&left, &right))
    }

    /// Every stored entry matching `criteria`, ascending by version then path.
    pub fn find_entries(&self, directory: DirectoryId, criteria: &DriftCriteria) -> Result<Vec<VersionedEntry>> {
        let history = self.chain.history(directory)?;
        Ok(history
            .iter()
            .filter(|cs| criteria.admits_version(cs.version()))
            .flat_map(|cs| {
                cs.entries()
                    .iter()
                    .filter(move |e| criteria.matches(e))
                    .map(move |e| VersionedEntry {
                        version: cs.version(),
                        entry: e.clone(),
                    })
            })
            .collect())
    }

    /// Every entry that touched `path`, oldest first.
    pub fn file_history(&self, directory: DirectoryId, path: &RelativePath) -> Result<Vec<VersionedEntry>> {
        let history = self.chain.history(directory)?;
        Ok(history
            .iter()
            .filter_map(|cs| {
                cs.entries()
                    .binary_search_by(|e| e.path().cmp(path))
                    .ok()
                    .map(|idx| VersionedEntry {
                        version: cs.version(),
                        entry: cs.entries()[idx].clone(),
                    })
            })
            .collect())
    }

    /// Per-version overview of a chain.
    pub fn summary(&self, directory: DirectoryId) -> Result<Vec<VersionSummary>> {
        Ok(self
            .chain
            .history(directory)?
            .iter()
            .map(|cs| VersionSummary {
                id: cs.id(),
                version: cs.version(),
                category: cs.category(),
                created_at: cs.created_at(),
                counts: cs.counts(),
            })
            .collect())
    }
}
