use drift_core::{
    AcceptAll, ChangeSetChain, DirectoryId, DriftCategory, DriftEntry, FileRecord, FileRecordStore, QueryFacade,
    Snapshot, accept_all, diff,
};
use drift_fs::{Fingerprint, RelativePath};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Small path and content alphabets so generated snapshots overlap often
fn files() -> impl Strategy<Value = BTreeMap<String, u8>> {
    proptest::collection::btree_map("[a-c]{1,2}(/[a-c]{1,2})?", 0u8..4, 0..12)
}

fn snapshot(directory: DirectoryId, files: &BTreeMap<String, u8>) -> Snapshot {
    Snapshot::with_files(
        directory,
        files.iter().map(|(path, body)| {
            (
                RelativePath::parse(path).unwrap(),
                FileRecord::new(Fingerprint::of(&[*body]), 1),
            )
        }),
    )
}

fn shape(entries: &[DriftEntry]) -> Vec<(String, DriftCategory, Option<Fingerprint>, Option<Fingerprint>)> {
    entries
        .iter()
        .map(|e| {
            (
                e.path().to_string(),
                e.category(),
                e.old().map(FileRecord::fingerprint),
                e.new_record().map(FileRecord::fingerprint),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn diff_of_identical_snapshots_is_empty(a in files()) {
        let s = snapshot(DirectoryId::new(), &a);
        prop_assert!(diff(Some(&s), &s, &AcceptAll).is_empty());
    }

    #[test]
    fn disjoint_snapshots_add_and_remove_every_path(a in files(), b in files()) {
        let b: BTreeMap<_, _> = b.into_iter().filter(|(p, _)| !a.contains_key(p)).collect();
        let id = DirectoryId::new();
        let entries = diff(Some(&snapshot(id, &a)), &snapshot(id, &b), &AcceptAll);

        prop_assert_eq!(entries.len(), a.len() + b.len());
        for entry in &entries {
            let expected = if a.contains_key(entry.path().as_str()) {
                DriftCategory::Removed
            } else {
                DriftCategory::Added
            };
            prop_assert_eq!(entry.category(), expected);
        }
    }

    #[test]
    fn diff_is_deterministic_and_path_ordered(a in files(), b in files()) {
        let id = DirectoryId::new();
        let (left, right) = (snapshot(id, &a), snapshot(id, &b));
        let first = diff(Some(&left), &right, &AcceptAll);
        let second = diff(Some(&left), &right, &AcceptAll);
        prop_assert_eq!(shape(&first), shape(&second));
        prop_assert!(first.windows(2).all(|w| w[0].path() < w[1].path()));
    }

    #[test]
    fn applying_the_diff_reproduces_the_target(a in files(), b in files()) {
        let id = DirectoryId::new();
        let chain = ChangeSetChain::in_memory(Arc::new(FileRecordStore::default()));
        chain.track(id, accept_all());
        chain.commit(&snapshot(id, &a)).unwrap();
        chain.commit(&snapshot(id, &b)).unwrap();
        let state = chain.current_state(id).unwrap();
        let target = snapshot(id, &b);
        prop_assert_eq!(state.files(), target.files());
    }

    #[test]
    fn net_diff_composes_across_versions(a in files(), b in files(), c in files()) {
        let id = DirectoryId::new();
        let chain = Arc::new(ChangeSetChain::in_memory(Arc::new(FileRecordStore::default())));
        chain.track(id, accept_all());
        for files in [&a, &b, &c] {
            chain.commit(&snapshot(id, files)).unwrap();
        }
        let query = QueryFacade::new(chain);

        let net = query.diff_between(id, 1, 3).unwrap();
        let direct = diff(Some(&snapshot(id, &a)), &snapshot(id, &c), &AcceptAll);
        prop_assert_eq!(shape(&net), shape(&direct));
    }
}
