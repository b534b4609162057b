//! [`TestTree`] builder for drift test scenarios.

use drift_fs::NormalizedPath;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A temporary directory tree with helpers for mutating files between scans.
///
/// # Example
///
/// ```rust,no_run
/// use drift_test_utils::TestTree;
///
/// let tree = TestTree::new();
/// tree.write("conf/server.xml", "<server/>");
/// tree.remove("conf/server.xml");
/// assert!(!tree.exists("conf/server.xml"));
/// ```
pub struct TestTree {
    temp_dir: TempDir,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create an empty temporary directory.
    ///
    /// # Panics
    /// Panics if the temporary directory cannot be created.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new()
                .unwrap_or_else(|e| panic!("TestTree::new: failed to create temp dir: {e}")),
        }
    }

    /// Native path of the tree root.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Tree root as an absolute normalized base path.
    pub fn base(&self) -> NormalizedPath {
        NormalizedPath::new(self.root())
    }

    /// Write `content` to `relative`, creating parent directories.
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("TestTree::write: failed to create {}: {e}", parent.display()));
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("TestTree::write: failed to write {}: {e}", path.display()));
    }

    /// Delete the file at `relative`.
    ///
    /// # Panics
    /// Panics if the file does not exist or cannot be removed.
    pub fn remove(&self, relative: &str) {
        let path = self.root().join(relative);
        fs::remove_file(&path)
            .unwrap_or_else(|e| panic!("TestTree::remove: failed to remove {}: {e}", path.display()));
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root().join(relative).exists()
    }

    /// Read back the file at `relative`.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read(&self, relative: &str) -> Vec<u8> {
        let path = self.root().join(relative);
        fs::read(&path).unwrap_or_else(|e| panic!("TestTree::read: failed to read {}: {e}", path.display()))
    }
}
