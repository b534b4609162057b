//! Chains restored from the state directory after a restart

use drift_core::{ChainStatus, DriftCategory, DriftMonitor, FsWalker, MonitoredDirectory};
use drift_fs::{Fingerprint, NormalizedPath};
use drift_test_utils::TestTree;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn open(state: &TempDir) -> DriftMonitor {
    DriftMonitor::open(NormalizedPath::new(state.path())).unwrap()
}

fn scan(monitor: &DriftMonitor, name: &str) -> u32 {
    let id = monitor.find_by_name(name).unwrap().id;
    monitor
        .scan(id, &FsWalker::new(), &CancellationToken::new())
        .unwrap()
        .change_set
        .version()
}

#[test]
fn history_survives_reopen() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");
    tree.write("b.conf", "1");

    let before = {
        let monitor = open(&state);
        monitor
            .register(MonitoredDirectory::new("conf", "web-01", tree.base()).unwrap())
            .unwrap();
        scan(&monitor, "conf");
        tree.write("a.conf", "2");
        scan(&monitor, "conf");
        let id = monitor.find_by_name("conf").unwrap().id;
        (id, monitor.query().summary(id).unwrap(), monitor.query().current_state(id).unwrap())
    };

    let monitor = open(&state);
    let (id, summary, current) = before;
    assert_eq!(monitor.directories().len(), 1);
    assert_eq!(monitor.query().summary(id).unwrap(), summary);
    assert_eq!(
        monitor.query().current_state(id).unwrap().files(),
        current.files()
    );
    assert_eq!(monitor.chain().status(id).unwrap(), ChainStatus::Active { latest: 2 });

    // Restored entries hold their record references
    assert_eq!(monitor.store().ref_count(&Fingerprint::of(b"1")), Some(3));
    assert_eq!(monitor.collect_garbage().removed, 0);

    // New scans continue the numbering and diff against the restored state
    tree.remove("b.conf");
    assert_eq!(scan(&monitor, "conf"), 3);
    let v3 = monitor.chain().change_set(id, 3).unwrap();
    let summary: Vec<_> = v3.entries().iter().map(|e| (e.path().as_str(), e.category())).collect();
    assert_eq!(summary, vec![("b.conf", DriftCategory::Removed)]);
}

#[test]
fn purge_is_durable() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");

    {
        let monitor = open(&state);
        monitor
            .register(MonitoredDirectory::new("conf", "web-01", tree.base()).unwrap())
            .unwrap();
        scan(&monitor, "conf");
        tree.write("a.conf", "2");
        scan(&monitor, "conf");
        tree.write("a.conf", "3");
        scan(&monitor, "conf");
        let id = monitor.find_by_name("conf").unwrap().id;
        let report = monitor.purge(id, 2).unwrap();
        assert_eq!(report.removed, vec![3, 2]);
        assert_eq!(report.latest, 1);
    }

    let monitor = open(&state);
    let id = monitor.find_by_name("conf").unwrap().id;
    assert_eq!(monitor.chain().latest_version(id).unwrap(), 1);

    // The next scan is version 2 again and sees the drift from version 1
    assert_eq!(scan(&monitor, "conf"), 2);
    let v2 = monitor.chain().change_set(id, 2).unwrap();
    assert_eq!(v2.entries().len(), 1);
    assert_eq!(
        v2.entries()[0].old().unwrap().fingerprint(),
        Fingerprint::of(b"1")
    );
    assert_eq!(
        v2.entries()[0].new_record().unwrap().fingerprint(),
        Fingerprint::of(b"3")
    );
}

#[test]
fn unregistered_directory_is_gone_after_reopen() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");

    {
        let monitor = open(&state);
        let id = monitor
            .register(MonitoredDirectory::new("conf", "web-01", tree.base()).unwrap())
            .unwrap();
        scan(&monitor, "conf");
        assert!(matches!(
            monitor.unregister(id),
            Err(drift_core::Error::DirectoryInUse { .. })
        ));
        monitor.purge(id, 1).unwrap();
        monitor.unregister(id).unwrap();
        assert!(!state.path().join("changesets").join(id.to_string()).exists());
    }

    let monitor = open(&state);
    assert!(monitor.directories().is_empty());
    assert!(monitor.find_by_name("conf").is_none());
}

#[test]
fn second_monitor_cannot_overwrite_archived_versions() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");

    let first = open(&state);
    first
        .register(MonitoredDirectory::new("conf", "web-01", tree.base()).unwrap())
        .unwrap();
    let second = open(&state);
    let id = first.find_by_name("conf").unwrap().id;

    let kept = first
        .scan(id, &FsWalker::new(), &CancellationToken::new())
        .unwrap()
        .change_set;
    tree.write("a.conf", "2");
    let err = second
        .scan(id, &FsWalker::new(), &CancellationToken::new())
        .unwrap_err();
    assert!(
        matches!(err, drift_core::Error::VersionConflict { version: 1, .. }),
        "got {err:?}"
    );
    assert_eq!(second.chain().latest_version(id).unwrap(), 0);

    // The archive still holds what the first monitor committed
    let reopened = open(&state);
    assert_eq!(*reopened.chain().change_set(id, 1).unwrap(), *kept);
}
