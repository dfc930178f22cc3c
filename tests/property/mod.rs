//! Property-based testing for provenant
//!
//! Uses proptest to check differencing invariants across randomly generated
//! snapshot pairs.

use ::provenant::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Generate root-relative file paths (0-3 directories deep)
fn path_strategy() -> impl Strategy<Value = String> {
    let dirs = prop::collection::vec("[a-z]{1,6}", 0..=3);
    let file = prop_oneof!["[a-z]{1,8}\\.(php|txt|css)", "file[0-9]{1,3}"];
    (dirs, file).prop_map(|(dirs, file)| {
        let mut parts = dirs;
        parts.push(file);
        parts.join("/")
    })
}

/// Generate file content, text or binary
fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        "[a-z \n]{0,200}".prop_map(|s| s.into_bytes()),
        prop::collection::vec(any::<u8>(), 0..300),
    ]
}

/// A snapshot as path -> content, with no path being a prefix directory of another
fn snapshot_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(path_strategy(), content_strategy(), 0..12).prop_map(|files| {
        let paths: Vec<String> = files.keys().cloned().collect();
        files
            .into_iter()
            .filter(|(path, _)| !paths.iter().any(|other| other.starts_with(&format!("{path}/"))))
            .collect()
    })
}

fn materialize(root: &Path, files: &BTreeMap<String, Vec<u8>>) {
    for (path, content) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

fn compare(old: &BTreeMap<String, Vec<u8>>, new: &BTreeMap<String, Vec<u8>>) -> Comparison {
    let old_dir = TempDir::new().unwrap();
    let new_dir = TempDir::new().unwrap();
    materialize(old_dir.path(), old);
    materialize(new_dir.path(), new);
    SnapshotDiffer::new(old_dir.path().to_path_buf(), new_dir.path().to_path_buf())
        .compare()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_identical_snapshots_have_no_changes(files in snapshot_strategy()) {
        let comparison = compare(&files, &files);
        prop_assert!(comparison.changes.is_empty());
        prop_assert_eq!(comparison.summary.files_unchanged, files.len());
    }

    #[test]
    fn prop_every_path_in_exactly_one_class(old in snapshot_strategy(), new in snapshot_strategy()) {
        // Paths that are a file on one side and a directory on the other are out of scope
        let clash = old.keys().chain(new.keys()).any(|p| {
            old.keys().chain(new.keys()).any(|q| q.starts_with(&format!("{p}/")))
        });
        prop_assume!(!clash);

        let comparison = compare(&old, &new);
        let mut seen = BTreeSet::new();
        for change in &comparison.changes {
            prop_assert!(seen.insert(change.path.to_string()), "duplicate record for {}", change.path);
            let path = change.path.as_str();
            let expected = match (old.get(path), new.get(path)) {
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Removed,
                (Some(a), Some(b)) if a != b => ChangeKind::Modified,
                _ => panic!("record for unchanged path {path}"),
            };
            prop_assert_eq!(change.kind, expected);
        }

        let union: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let unchanged = union
            .iter()
            .filter(|p| matches!((old.get(p.as_str()), new.get(p.as_str())), (Some(a), Some(b)) if a == b))
            .count();
        prop_assert_eq!(comparison.summary.files_unchanged, unchanged);
        prop_assert_eq!(comparison.changes.len() + unchanged, union.len());
    }

    #[test]
    fn prop_records_sorted_by_path(old in snapshot_strategy(), new in snapshot_strategy()) {
        let clash = old.keys().chain(new.keys()).any(|p| {
            old.keys().chain(new.keys()).any(|q| q.starts_with(&format!("{p}/")))
        });
        prop_assume!(!clash);

        let comparison = compare(&old, &new);
        let paths: Vec<&str> = comparison.changes.iter().map(|c| c.path.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        prop_assert_eq!(paths, sorted);
    }

    #[test]
    fn prop_magnitude_zero_only_for_identical_text(a in "[a-z\n]{0,80}", b in "[a-z\n]{0,80}") {
        let magnitude = diff::magnitude(a.as_bytes(), b.as_bytes());
        if a == b {
            prop_assert_eq!(magnitude, Magnitude::DiffLines(0));
        } else {
            prop_assert!(matches!(magnitude, Magnitude::DiffLines(n) if n >= 4));
        }
    }

    #[test]
    fn prop_hash_routines_agree(data in prop::collection::vec(any::<u8>(), 0..20_000)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob");
        fs::write(&path, &data).unwrap();

        let from_file = utils::hash_file(&path).unwrap();
        prop_assert_eq!(from_file, utils::hash_bytes(&data));
        prop_assert_eq!(from_file, utils::hash_reader(&mut &data[..]).unwrap());
    }
}
