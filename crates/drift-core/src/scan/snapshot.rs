//! Snapshots: the file set of one directory at one point in time

use crate::model::{DirectoryId, DriftCategory, DriftEntry, FileRecord};
use chrono::{DateTime, Utc};
use drift_fs::RelativePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Mapping of relative path to file record, ordered byte-wise by path.
///
/// Snapshots are ephemeral: only the drift entries computed from them are
/// persisted. Each one carries the id of the scan that produced it so a
/// repeated commit of the same scan can be recognised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    directory: DirectoryId,
    captured_at: DateTime<Utc>,
    scan_id: Uuid,
    files: BTreeMap<RelativePath, FileRecord>,
}

impl Snapshot {
    /// Empty snapshot for a fresh scan.
    pub fn new(directory: DirectoryId) -> Self {
        Self {
            directory,
            captured_at: Utc::now(),
            scan_id: Uuid::new_v4(),
            files: BTreeMap::new(),
        }
    }

    pub fn with_files(
        directory: DirectoryId,
        files: impl IntoIterator<Item = (RelativePath, FileRecord)>,
    ) -> Self {
        let mut snapshot = Self::new(directory);
        snapshot.files.extend(files);
        snapshot
    }

    /// Insert a file, returning the record previously held for the path.
    pub fn insert(&mut self, path: RelativePath, record: FileRecord) -> Option<FileRecord> {
        self.files.insert(path, record)
    }

    pub fn directory(&self) -> DirectoryId {
        self.directory
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    pub fn get(&self, path: &RelativePath) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelativePath, &FileRecord)> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.files.keys()
    }

    pub fn files(&self) -> &BTreeMap<RelativePath, FileRecord> {
        &self.files
    }

    /// Roll an entry forward onto this state.
    pub(crate) fn apply(&mut self, entry: &DriftEntry) {
        match (entry.category(), entry.new_record()) {
            (DriftCategory::Removed, _) | (_, None) => {
                self.files.remove(entry.path());
            }
            (_, Some(new)) => {
                self.files.insert(entry.path().clone(), new.without_content());
            }
        }
    }

    /// Roll an entry back off this state.
    pub(crate) fn revert(&mut self, entry: &DriftEntry) {
        match entry.old() {
            Some(old) => {
                self.files.insert(entry.path().clone(), old.without_content());
            }
            None => {
                self.files.remove(entry.path());
            }
        }
    }

    pub(crate) fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_fs::Fingerprint;

    fn path(p: &str) -> RelativePath {
        RelativePath::parse(p).unwrap()
    }

    fn record(content: &str) -> FileRecord {
        FileRecord::new(Fingerprint::of(content.as_bytes()), content.len() as u64)
    }

    #[test]
    fn iteration_is_bytewise_ordered() {
        let snapshot = Snapshot::with_files(
            DirectoryId::new(),
            [
                (path("b.txt"), record("1")),
                (path("B.txt"), record("2")),
                (path("a/z.txt"), record("3")),
            ],
        );
        let order: Vec<_> = snapshot.paths().map(|p| p.as_str()).collect();
        assert_eq!(order, vec!["B.txt", "a/z.txt", "b.txt"]);
    }

    #[test]
    fn apply_then_revert_restores_state() {
        let mut snapshot = Snapshot::with_files(DirectoryId::new(), [(path("a"), record("X"))]);
        let original = snapshot.clone();
        let entries = [
            DriftEntry::changed(path("a"), record("X"), record("Y")).unwrap(),
            DriftEntry::added(path("b"), record("Z")),
        ];
        for entry in &entries {
            snapshot.apply(entry);
        }
        assert_eq!(snapshot.get(&path("a")), Some(&record("Y")));
        for entry in entries.iter().rev() {
            snapshot.revert(entry);
        }
        assert_eq!(snapshot.files(), original.files());
    }
}
