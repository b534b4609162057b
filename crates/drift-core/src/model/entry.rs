//! Drift entries: one file-level delta within a change set

use super::{ChangeSetId, FileRecord};
use crate::{Error, Result};
use drift_fs::RelativePath;
use serde::{Deserialize, Serialize};

/// Stable wire vocabulary for file-level drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftCategory {
    /// Path appeared
    Added,
    /// Path kept, content fingerprint changed
    Changed,
    /// Path vanished
    Removed,
}

impl DriftCategory {
    pub const ALL: [DriftCategory; 3] = [Self::Added, Self::Changed, Self::Removed];

    /// Single-letter code used in change-set files.
    pub fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Changed => 'C',
            Self::Removed => 'R',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Added),
            "C" => Some(Self::Changed),
            "R" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriftCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Changed => write!(f, "CHANGED"),
            Self::Removed => write!(f, "REMOVED"),
        }
    }
}

impl std::str::FromStr for DriftCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADDED" | "A" => Ok(Self::Added),
            "CHANGED" | "C" => Ok(Self::Changed),
            "REMOVED" | "R" => Ok(Self::Removed),
            other => Err(format!("unknown drift category '{}'", other)),
        }
    }
}

/// One file-level delta.
///
/// Invariants, checked at construction:
/// - `Added`: no old record, new record present
/// - `Removed`: old record present, no new record
/// - `Changed`: both present with different fingerprints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryRepr", into = "EntryRepr")]
pub struct DriftEntry {
    change_set: Option<ChangeSetId>,
    path: RelativePath,
    directory: String,
    category: DriftCategory,
    old: Option<FileRecord>,
    new: Option<FileRecord>,
}

impl DriftEntry {
    /// Validate and build an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntry`] when the records do not match the
    /// category.
    pub fn new(
        path: RelativePath,
        category: DriftCategory,
        old: Option<FileRecord>,
        new: Option<FileRecord>,
    ) -> Result<Self> {
        let reason = match (category, &old, &new) {
            (DriftCategory::Added, None, Some(_)) => None,
            (DriftCategory::Added, _, _) => Some("ADDED requires only a new record"),
            (DriftCategory::Removed, Some(_), None) => None,
            (DriftCategory::Removed, _, _) => Some("REMOVED requires only an old record"),
            (DriftCategory::Changed, Some(o), Some(n)) if o.fingerprint() == n.fingerprint() => {
                Some("CHANGED requires differing fingerprints")
            }
            (DriftCategory::Changed, Some(_), Some(_)) => None,
            (DriftCategory::Changed, _, _) => Some("CHANGED requires old and new records"),
        };
        if let Some(reason) = reason {
            return Err(Error::InvalidEntry {
                path: path.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(Self::build(path, category, old, new))
    }

    pub fn added(path: RelativePath, new: FileRecord) -> Self {
        Self::build(path, DriftCategory::Added, None, Some(new))
    }

    pub fn removed(path: RelativePath, old: FileRecord) -> Self {
        Self::build(path, DriftCategory::Removed, Some(old), None)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidEntry`] if both records share a fingerprint.
    pub fn changed(path: RelativePath, old: FileRecord, new: FileRecord) -> Result<Self> {
        Self::new(path, DriftCategory::Changed, Some(old), Some(new))
    }

    /// CHANGED entry for records the caller already knows to differ.
    pub(crate) fn from_pair(path: RelativePath, old: FileRecord, new: FileRecord) -> Self {
        debug_assert_ne!(old.fingerprint(), new.fingerprint());
        Self::build(path, DriftCategory::Changed, Some(old), Some(new))
    }

    fn build(
        path: RelativePath,
        category: DriftCategory,
        old: Option<FileRecord>,
        new: Option<FileRecord>,
    ) -> Self {
        Self {
            change_set: None,
            directory: path.directory().to_string(),
            path,
            category,
            old,
            new,
        }
    }

    pub(crate) fn owned_by(mut self, change_set: ChangeSetId) -> Self {
        self.change_set = Some(change_set);
        self
    }

    /// Owning change set; `None` for net entries derived across versions.
    pub fn change_set(&self) -> Option<ChangeSetId> {
        self.change_set
    }

    pub fn path(&self) -> &RelativePath {
        &self.path
    }

    /// Parent directory of the path, `"."` at the base.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn category(&self) -> DriftCategory {
        self.category
    }

    pub fn old(&self) -> Option<&FileRecord> {
        self.old.as_ref()
    }

    pub fn new_record(&self) -> Option<&FileRecord> {
        self.new.as_ref()
    }

    /// Records referenced by this entry, old first.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.old.iter().chain(self.new.iter())
    }
}

#[derive(Serialize, Deserialize)]
struct EntryRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    change_set: Option<ChangeSetId>,
    path: RelativePath,
    category: DriftCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old: Option<FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new: Option<FileRecord>,
}

impl TryFrom<EntryRepr> for DriftEntry {
    type Error = Error;

    fn try_from(repr: EntryRepr) -> Result<Self> {
        let entry = Self::new(repr.path, repr.category, repr.old, repr.new)?;
        Ok(match repr.change_set {
            Some(id) => entry.owned_by(id),
            None => entry,
        })
    }
}

impl From<DriftEntry> for EntryRepr {
    fn from(entry: DriftEntry) -> Self {
        Self {
            change_set: entry.change_set,
            path: entry.path,
            category: entry.category,
            old: entry.old,
            new: entry.new,
        }
    }
}
