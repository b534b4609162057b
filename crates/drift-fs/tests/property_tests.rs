use drift_fs::{NormalizedPath, RelativePath, fingerprint};
use proptest::prelude::*;

proptest! {
    #[test]
    fn relative_paths_never_escape(s in "[a-z./\\\\]{0,24}") {
        if let Ok(path) = RelativePath::parse(&s) {
            let text = path.as_str();
            prop_assert!(!text.contains('\\'));
            prop_assert!(!text.starts_with('/'));
            prop_assert!(!text.ends_with('/'));
            prop_assert!(!text.contains("//"));
            prop_assert!(text.split('/').all(|seg| seg != "." && seg != ".."));
            // canonical form is a fixed point
            prop_assert_eq!(RelativePath::parse(text).unwrap(), path.clone());
        }
    }

    #[test]
    fn normalization_is_idempotent(s in "\\PC*") {
        let once = NormalizedPath::new(&s);
        let twice = NormalizedPath::new(once.as_str());
        prop_assert!(!once.as_str().contains('\\'));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn equal_bytes_equal_fingerprints(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let copy = bytes.clone();
        prop_assert_eq!(fingerprint(&bytes), fingerprint(&copy));
    }
}
