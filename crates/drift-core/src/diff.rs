//! Snapshot comparison
//!
//! [`diff`] turns a previous and a current snapshot into the ordered drift
//! entries of a change set. [`compare`] is the reporting variant used to put
//! any two states side by side, possibly of different directories.
//!
//! Both walk the two path-sorted maps in lockstep, so a diff costs one pass
//! over each side and emits entries already in byte-wise path order.

use crate::filter::PathFilter;
use crate::model::{DriftEntry, FileRecord};
use crate::scan::Snapshot;
use drift_fs::RelativePath;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::iter::Peekable;

/// Compute the drift between `previous` (or the empty baseline) and
/// `current`.
///
/// Paths rejected by `filter` are dropped from both sides before comparing.
/// Equal fingerprints produce no entry. The function has no side effects.
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot, filter: &dyn PathFilter) -> Vec<DriftEntry> {
    let empty = std::collections::BTreeMap::new();
    let left = previous.map_or(&empty, Snapshot::files);
    let mut entries = Vec::new();

    merge(
        left.iter().filter(|(p, _)| filter.includes(p)),
        current.iter().filter(|(p, _)| filter.includes(p)),
        |side| match side {
            Side::Left(path, old) => entries.push(DriftEntry::removed(path.clone(), old.without_content())),
            Side::Right(path, new) => entries.push(DriftEntry::added(path.clone(), new.without_content())),
            Side::Both(path, old, new) => {
                if old.fingerprint() != new.fingerprint() {
                    entries.push(DriftEntry::from_pair(path.clone(), old.without_content(), new.without_content()));
                }
            }
        },
    );
    entries
}

/// Side-by-side report of two states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotComparison {
    /// Paths only the right side has
    pub not_in_left: Vec<RelativePath>,
    /// Paths only the left side has
    pub not_in_right: Vec<RelativePath>,
    /// Paths on both sides with different fingerprints
    pub in_conflict: Vec<RelativePath>,
}

impl SnapshotComparison {
    pub fn is_identical(&self) -> bool {
        self.not_in_left.is_empty() && self.not_in_right.is_empty() && self.in_conflict.is_empty()
    }
}

/// Compare two states path by path.
pub fn compare(left: &Snapshot, right: &Snapshot) -> SnapshotComparison {
    let mut report = SnapshotComparison::default();
    merge(left.iter(), right.iter(), |side| match side {
        Side::Left(path, _) => report.not_in_right.push(path.clone()),
        Side::Right(path, _) => report.not_in_left.push(path.clone()),
        Side::Both(path, l, r) => {
            if l.fingerprint() != r.fingerprint() {
                report.in_conflict.push(path.clone());
            }
        }
    });
    report
}

enum Side<'a> {
    Left(&'a RelativePath, &'a FileRecord),
    Right(&'a RelativePath, &'a FileRecord),
    Both(&'a RelativePath, &'a FileRecord, &'a FileRecord),
}

fn merge<'a, L, R>(left: L, right: R, mut visit: impl FnMut(Side<'a>))
where
    L: Iterator<Item = (&'a RelativePath, &'a FileRecord)>,
    R: Iterator<Item = (&'a RelativePath, &'a FileRecord)>,
{
    let mut left: Peekable<L> = left.peekable();
    let mut right: Peekable<R> = right.peekable();
    loop {
        let order = match (left.peek(), right.peek()) {
            (Some((l, _)), Some((r, _))) => l.cmp(r),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };
        match order {
            Ordering::Less => {
                if let Some((path, record)) = left.next() {
                    visit(Side::Left(path, record));
                }
            }
            Ordering::Greater => {
                if let Some((path, record)) = right.next() {
                    visit(Side::Right(path, record));
                }
            }
            Ordering::Equal => {
                if let (Some((path, l)), Some((_, r))) = (left.next(), right.next()) {
                    visit(Side::Both(path, l, r));
                }
            }
        }
    }
}
