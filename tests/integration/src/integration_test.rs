//! End-to-end drift detection over real directory trees
//!
//! Exercises the complete flow: register -> walk -> snapshot -> diff ->
//! commit -> archive -> query -> wire export.

use drift_core::persist::wire::read_change_set;
use drift_core::{
    ChangeSetCategory, DriftCategory, DriftConfig, DriftCriteria, DriftMonitor, FileWalker, FsWalker,
    MonitoredDirectory, WalkEntry,
};
use drift_fs::{Fingerprint, NormalizedPath, RelativePath};
use drift_test_utils::TestTree;
use pretty_assertions::assert_eq;
use std::io;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn open(state: &TempDir) -> DriftMonitor {
    DriftMonitor::open(NormalizedPath::new(state.path())).unwrap()
}

fn register(monitor: &DriftMonitor, name: &str, tree: &TestTree) -> drift_core::DirectoryId {
    monitor
        .register(MonitoredDirectory::new(name, "web-01", tree.base()).unwrap())
        .unwrap()
}

fn categories(entries: &[drift_core::DriftEntry]) -> Vec<(&str, DriftCategory)> {
    entries.iter().map(|e| (e.path().as_str(), e.category())).collect()
}

#[test]
fn test_full_drift_lifecycle() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("conf/server.xml", "<server/>");
    tree.write("conf/web.xml", "<web-app/>");
    tree.write("lib/app.jar", "jar-v1");

    let monitor = open(&state);
    let id = register(&monitor, "tomcat", &tree);
    let walker = FsWalker::from_config(&monitor.config().store);
    let cancel = CancellationToken::new();

    // Initial inventory
    let v1 = monitor.scan(id, &walker, &cancel).unwrap().change_set;
    assert_eq!(v1.category(), ChangeSetCategory::Coverage);
    assert_eq!(
        categories(v1.entries()),
        vec![
            ("conf/server.xml", DriftCategory::Added),
            ("conf/web.xml", DriftCategory::Added),
            ("lib/app.jar", DriftCategory::Added),
        ]
    );

    // An operator edits a file, drops another and deploys a new one
    tree.write("conf/server.xml", "<server port=\"8443\"/>");
    tree.remove("lib/app.jar");
    tree.write("lib/app-2.jar", "jar-v2");
    let v2 = monitor.scan(id, &walker, &cancel).unwrap().change_set;
    assert_eq!(v2.category(), ChangeSetCategory::Drift);
    assert_eq!(
        categories(v2.entries()),
        vec![
            ("conf/server.xml", DriftCategory::Changed),
            ("lib/app-2.jar", DriftCategory::Added),
            ("lib/app.jar", DriftCategory::Removed),
        ]
    );

    // Nothing changed: still a new, empty version
    let v3 = monitor.scan(id, &walker, &cancel).unwrap().change_set;
    assert_eq!(v3.version(), 3);
    assert!(v3.is_empty());

    let query = monitor.query();
    let net = query.diff_between(id, 1, 3).unwrap();
    assert_eq!(categories(&net), categories(v2.entries()));

    let current = query.current_state(id).unwrap();
    let paths: Vec<&str> = current.paths().map(RelativePath::as_str).collect();
    assert_eq!(paths, vec!["conf/server.xml", "conf/web.xml", "lib/app-2.jar"]);
    assert_eq!(
        current
            .get(&RelativePath::parse("conf/server.xml").unwrap())
            .unwrap()
            .fingerprint(),
        Fingerprint::of(b"<server port=\"8443\"/>")
    );

    let conf_only = query
        .find_entries(id, &DriftCriteria::new().directory("conf", false))
        .unwrap();
    assert_eq!(conf_only.len(), 3);

    // Every version was archived
    let archived = state.path().join("changesets").join(id.to_string());
    for version in 1..=3 {
        assert!(archived.join(format!("{version:08}.json")).exists());
    }
}

#[test]
fn test_exported_change_set_parses_back() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "alpha");
    tree.write("dir with space/b.conf", "beta");

    let monitor = open(&state);
    let id = register(&monitor, "conf", &tree);
    let walker = FsWalker::new();
    let cancel = CancellationToken::new();
    monitor.scan(id, &walker, &cancel).unwrap();
    tree.write("a.conf", "alpha-2");
    let v2 = monitor.scan(id, &walker, &cancel).unwrap().change_set;

    let text = monitor.export_change_set(id, 2).unwrap();
    let parsed = read_change_set(text.as_bytes()).unwrap();

    assert_eq!(parsed.headers.directory_id, id);
    assert_eq!(parsed.headers.resource_id, "web-01");
    assert_eq!(parsed.headers.category, ChangeSetCategory::Drift);
    assert_eq!(parsed.headers.version, 2);
    assert_eq!(parsed.entries.len(), v2.entries().len());
    for (parsed, stored) in parsed.entries.iter().zip(v2.entries()) {
        assert_eq!(parsed.path(), stored.path());
        assert_eq!(parsed.category(), stored.category());
        assert_eq!(
            parsed.new_record().map(|r| r.fingerprint()),
            stored.new_record().map(|r| r.fingerprint())
        );
    }

    let v1 = read_change_set(monitor.export_change_set(id, 1).unwrap().as_bytes()).unwrap();
    assert!(
        v1.entries
            .iter()
            .any(|e| e.path().as_str() == "dir with space/b.conf")
    );
}

#[test]
fn test_identical_bodies_share_one_record() {
    let state = TempDir::new().unwrap();
    let left = TestTree::new();
    let right = TestTree::new();
    left.write("log4j.properties", "rootLogger=INFO");
    right.write("config/log4j.properties", "rootLogger=INFO");
    right.write("extra.conf", "x");

    let monitor = open(&state);
    register(&monitor, "left", &left);
    register(&monitor, "right", &right);

    let report = monitor.run_cycle(&FsWalker::new(), &CancellationToken::new());
    assert_eq!(report.len(), 2);
    assert!(report.iter().all(|(_, result)| result.is_ok()));

    assert_eq!(monitor.store().len(), 2);
    let shared = Fingerprint::of(b"rootLogger=INFO");
    assert_eq!(monitor.store().ref_count(&shared), Some(2));
}

#[test]
fn test_retained_content_follows_config() {
    let state = TempDir::new().unwrap();
    let mut config = DriftConfig::default();
    config.store.retain_content = true;
    config.save(&NormalizedPath::new(state.path())).unwrap();

    let tree = TestTree::new();
    tree.write("small.conf", "keep me");
    let monitor = open(&state);
    assert!(monitor.config().store.retain_content);
    let id = register(&monitor, "conf", &tree);

    let walker = FsWalker::from_config(&monitor.config().store);
    monitor.scan(id, &walker, &CancellationToken::new()).unwrap();

    let record = monitor.store().get(&Fingerprint::of(b"keep me")).unwrap();
    assert_eq!(record.content(), Some(&b"keep me"[..]));
}

/// Walker that fires a cancellation token after yielding its first entry.
struct InterruptingWalker {
    token: CancellationToken,
}

impl FileWalker for InterruptingWalker {
    fn walk<'a>(&'a self, _base: &NormalizedPath) -> io::Result<Box<dyn Iterator<Item = WalkEntry> + Send + 'a>> {
        let entries = vec![WalkEntry::bytes("a.conf", "1"), WalkEntry::bytes("b.conf", "2")];
        Ok(Box::new(entries.into_iter().enumerate().map(move |(idx, entry)| {
            if idx == 1 {
                self.token.cancel();
            }
            entry
        })))
    }
}

#[test]
fn test_cancelled_scan_leaves_chain_untouched() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    let monitor = open(&state);
    let id = register(&monitor, "conf", &tree);

    let cancel = CancellationToken::new();
    let walker = InterruptingWalker { token: cancel.clone() };
    let err = monitor.scan(id, &walker, &cancel).unwrap_err();
    assert!(matches!(err, drift_core::Error::Cancelled { .. }));
    assert_eq!(monitor.chain().latest_version(id).unwrap(), 0);

    // Records interned before the cancel hold no references
    let stats = monitor.collect_garbage();
    assert_eq!(monitor.store().len(), 0);
    assert_eq!(stats.removed, 1);
}
