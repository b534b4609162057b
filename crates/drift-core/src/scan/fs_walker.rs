//! Local filesystem walker

use super::{FileWalker, WalkEntry};
use crate::config::StoreConfig;
use drift_fs::{NormalizedPath, fingerprint_file};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Streams every regular file beneath a base directory.
///
/// Symlinks are reported by neither side of the link: they are not followed
/// and not captured. Files are hashed in chunks unless content retention is
/// enabled, in which case bodies up to the retention limit are read whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWalker {
    read_content: bool,
    max_content_bytes: u64,
}

impl FsWalker {
    /// Walker that only fingerprints.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            read_content: config.retain_content,
            max_content_bytes: config.max_retained_bytes,
        }
    }

    fn entry_for(&self, root: &Path, path: &Path) -> WalkEntry {
        let relative = relative_string(root, path);
        let metadata = match path.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot stat file");
                return WalkEntry::unreadable(relative);
            }
        };

        if self.read_content && metadata.len() <= self.max_content_bytes {
            return match std::fs::read(path) {
                Ok(bytes) => WalkEntry::bytes(relative, bytes),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Cannot read file");
                    WalkEntry::unreadable(relative)
                }
            };
        }

        match fingerprint_file(path) {
            Ok((fingerprint, len)) => WalkEntry::fingerprint(relative, fingerprint, len),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot fingerprint file");
                WalkEntry::unreadable(relative)
            }
        }
    }
}

impl FileWalker for FsWalker {
    fn walk<'a>(
        &'a self,
        base: &NormalizedPath,
    ) -> io::Result<Box<dyn Iterator<Item = WalkEntry> + Send + 'a>> {
        let root: PathBuf = dunce::canonicalize(base.to_native())?;
        // Fail fast on a base we cannot list
        std::fs::read_dir(&root)?;

        let walker = WalkDir::new(&root).follow_links(false).min_depth(1);
        let entries = walker.into_iter().filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(self.entry_for(&root, entry.path())),
            Ok(entry) => {
                if entry.path_is_symlink() {
                    debug!(path = %entry.path().display(), "Not following symlink");
                }
                None
            }
            Err(e) => match e.path() {
                Some(path) => {
                    warn!(path = %path.display(), error = %e, "Walk error");
                    Some(WalkEntry::unreadable(relative_string(&root, path)))
                }
                None => {
                    warn!(error = %e, "Walk error without a path");
                    None
                }
            },
        });
        Ok(Box::new(entries))
    }
}

fn relative_string(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonitoredDirectory;
    use crate::scan::{ScanOutcome, SkipReason, SnapshotScanner};
    use crate::store::FileRecordStore;
    use drift_fs::{Fingerprint, RelativePath};
    use drift_test_utils::TestTree;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn scan(tree: &TestTree, walker: FsWalker, store: Arc<FileRecordStore>) -> ScanOutcome {
        let directory = MonitoredDirectory::new("t", "local", tree.base()).unwrap();
        SnapshotScanner::new(store)
            .scan(&directory, &walker, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn walks_nested_files() {
        let tree = TestTree::new();
        tree.write("a.conf", "A");
        tree.write("nested/deep/b.conf", "B");

        let outcome = scan(&tree, FsWalker::new(), Arc::new(FileRecordStore::default()));
        let paths: Vec<_> = outcome.snapshot.paths().map(RelativePath::as_str).collect();
        assert_eq!(paths, vec!["a.conf", "nested/deep/b.conf"]);
        let record = outcome.snapshot.get(&RelativePath::parse("a.conf").unwrap()).unwrap();
        assert_eq!(record.fingerprint(), Fingerprint::of(b"A"));
        assert!(record.content().is_none());
    }

    #[test]
    fn retains_small_bodies_when_configured() {
        let tree = TestTree::new();
        tree.write("small.txt", "tiny");
        let config = StoreConfig {
            retain_content: true,
            max_retained_bytes: 64,
        };
        let store = Arc::new(FileRecordStore::new(config));
        let outcome = scan(&tree, FsWalker::from_config(&config), store);
        let record = outcome.snapshot.get(&RelativePath::parse("small.txt").unwrap()).unwrap();
        assert_eq!(record.content(), Some(&b"tiny"[..]));
    }

    #[test]
    fn missing_base_fails_the_walk() {
        let tree = TestTree::new();
        let missing = tree.base().join("does-not-exist");
        assert!(FsWalker::new().walk(&missing).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let tree = TestTree::new();
        tree.write("real.txt", "R");
        std::os::unix::fs::symlink(tree.root().join("real.txt"), tree.root().join("link.txt")).unwrap();

        let outcome = scan(&tree, FsWalker::new(), Arc::new(FileRecordStore::default()));
        assert_eq!(outcome.snapshot.len(), 1);
        assert!(outcome.skipped.iter().all(|s| s.reason != SkipReason::EscapesBase));
    }
}
