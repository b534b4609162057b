//! Drift data model
//!
//! Every type here is an immutable value constructed fully at creation, with
//! the category invariants of [`DriftEntry`] validated up front.

mod change_set;
mod directory;
mod entry;
mod record;

pub use change_set::{ChangeCounts, ChangeSet, ChangeSetCategory, ChangeSetId};
pub use directory::{DirectoryId, MonitoredDirectory};
pub use entry::{DriftCategory, DriftEntry};
pub use record::FileRecord;
