//! Change sets: versioned, immutable diff results

use super::{DirectoryId, DriftCategory, DriftEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSetId(Uuid);

impl ChangeSetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChangeSetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a change set is the initial inventory or a later delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetCategory {
    /// Version 1: every file reported as added against an empty baseline
    Coverage,
    /// Any later version
    Drift,
}

impl ChangeSetCategory {
    pub fn for_version(version: u32) -> Self {
        if version <= 1 {
            Self::Coverage
        } else {
            Self::Drift
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Coverage => 'C',
            Self::Drift => 'D',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" => Some(Self::Coverage),
            "D" => Some(Self::Drift),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeSetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coverage => write!(f, "COVERAGE"),
            Self::Drift => write!(f, "DRIFT"),
        }
    }
}

/// Per-category entry totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
}

impl ChangeCounts {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a DriftEntry>) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            match entry.category() {
                DriftCategory::Added => counts.added += 1,
                DriftCategory::Changed => counts.changed += 1,
                DriftCategory::Removed => counts.removed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.added + self.changed + self.removed
    }
}

/// One committed diff in a directory's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    id: ChangeSetId,
    directory: DirectoryId,
    version: u32,
    category: ChangeSetCategory,
    created_at: DateTime<Utc>,
    /// Scan that triggered the commit, used to reject double commits
    scan_id: Uuid,
    entries: Vec<DriftEntry>,
}

impl ChangeSet {
    /// Assemble a change set, stamping every entry with its owner.
    ///
    /// Entries are expected in path order, as produced by the diff.
    pub(crate) fn new(
        directory: DirectoryId,
        version: u32,
        scan_id: Uuid,
        entries: Vec<DriftEntry>,
    ) -> Self {
        let id = ChangeSetId::new();
        Self {
            id,
            directory,
            version,
            category: ChangeSetCategory::for_version(version),
            created_at: Utc::now(),
            scan_id,
            entries: entries.into_iter().map(|e| e.owned_by(id)).collect(),
        }
    }

    pub fn id(&self) -> ChangeSetId {
        self.id
    }

    pub fn directory(&self) -> DirectoryId {
        self.directory
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn category(&self) -> ChangeSetCategory {
        self.category
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    pub fn entries(&self) -> &[DriftEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts::tally(&self.entries)
    }
}
