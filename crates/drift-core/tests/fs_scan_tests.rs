//! Scanning real directory trees

use drift_core::{DriftCategory, DriftConfig, DriftMonitor, Error, FsWalker, MonitoredDirectory, SkipReason};
use drift_test_utils::TestTree;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

#[test]
fn detects_drift_on_disk() {
    let tree = TestTree::new();
    tree.write("server.xml", "<server port=\"8080\"/>");
    tree.write("conf.d/app.properties", "debug=false");

    let state = TestTree::new();
    let monitor = DriftMonitor::open(state.base()).unwrap();
    let id = monitor
        .register(MonitoredDirectory::new("tomcat", "web-01", tree.base()).unwrap())
        .unwrap();
    let walker = FsWalker::new();
    let cancel = CancellationToken::new();

    let v1 = monitor.scan(id, &walker, &cancel).unwrap().change_set;
    assert_eq!(v1.counts().added, 2);

    tree.write("server.xml", "<server port=\"9090\"/>");
    tree.remove("conf.d/app.properties");
    tree.write("conf.d/new.properties", "x=1");

    let v2 = monitor.scan(id, &walker, &cancel).unwrap().change_set;
    let summary: Vec<_> = v2
        .entries()
        .iter()
        .map(|e| (e.path().as_str().to_string(), e.category()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("conf.d/app.properties".to_string(), DriftCategory::Removed),
            ("conf.d/new.properties".to_string(), DriftCategory::Added),
            ("server.xml".to_string(), DriftCategory::Changed),
        ]
    );
    assert!(state.exists(&format!("changesets/{id}/00000002.json")));
}

#[test]
fn missing_base_fails_without_touching_the_chain() {
    let tree = TestTree::new();
    let monitor = DriftMonitor::in_memory(DriftConfig::default());
    let id = monitor
        .register(MonitoredDirectory::new("gone", "web-01", tree.base().join("missing")).unwrap())
        .unwrap();

    let err = monitor
        .scan(id, &FsWalker::new(), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::Scan { .. }));
    assert_eq!(monitor.chain().latest_version(id).unwrap(), 0);
}

#[cfg(unix)]
#[test]
fn unreadable_files_are_reported_not_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let tree = TestTree::new();
    tree.write("ok.conf", "fine");
    tree.write("secret.key", "hidden");
    let secret = tree.root().join("secret.key");
    std::fs::set_permissions(&secret, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read(&secret).is_ok() {
        // Running as root: permissions are not enforced
        return;
    }

    let monitor = DriftMonitor::in_memory(DriftConfig::default());
    let id = monitor
        .register(MonitoredDirectory::new("t", "web-01", tree.base()).unwrap())
        .unwrap();
    let report = monitor
        .scan(id, &FsWalker::new(), &CancellationToken::new())
        .unwrap();
    assert_eq!(report.change_set.entries().len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::Unreadable);
}
