//! Main test module for provenant
//!
//! This module includes all test suites:
//! - Integration tests for full audits against in-memory remotes
//! - Property-based tests for differencing invariants
//! - Edge cases for snapshot listing and reporting

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::provenant::*;
    use std::fs;
    use tempfile::TempDir;

    fn differ(old: &TempDir, new: &TempDir) -> SnapshotDiffer {
        SnapshotDiffer::new(old.path().to_path_buf(), new.path().to_path_buf())
    }

    #[test]
    fn test_empty_snapshots() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();

        let comparison = differ(&old, &new).compare().unwrap();
        assert!(comparison.changes.is_empty());
        assert!(!comparison.summary.has_changes());
    }

    #[test]
    fn test_added_file_scenario() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();
        fs::write(old.path().join("a.txt"), "hello").unwrap();
        fs::write(new.path().join("a.txt"), "hello").unwrap();
        fs::write(new.path().join("b.txt"), "world").unwrap();

        let comparison = differ(&old, &new).compare().unwrap();
        assert_eq!(comparison.changes.len(), 1);
        assert_eq!(comparison.changes[0].path.as_str(), "b.txt");
        assert_eq!(comparison.changes[0].kind, ChangeKind::Added);
        assert_eq!(comparison.of_kind(ChangeKind::Modified).count(), 0);
        assert_eq!(comparison.of_kind(ChangeKind::Removed).count(), 0);
    }

    #[test]
    fn test_modified_file_scenario() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();
        fs::write(old.path().join("a.txt"), "line1\nline2\n").unwrap();
        fs::write(new.path().join("a.txt"), "line1\nline3\n").unwrap();

        let comparison = differ(&old, &new).compare().unwrap();
        assert_eq!(comparison.changes.len(), 1);
        let change = &comparison.changes[0];
        assert_eq!(change.kind, ChangeKind::Modified);
        match change.magnitude {
            Magnitude::DiffLines(n) => assert!(n > 0),
            ref other => panic!("unexpected magnitude {other:?}"),
        }
    }

    #[test]
    fn test_special_filenames() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();

        let names = [
            "file with spaces.txt",
            "file,with,commas.txt",
            "file\"quoted\".txt",
            "файл.txt",
            "文件.txt",
        ];
        let mut created = Vec::new();
        for name in names {
            if fs::write(new.path().join(name), name).is_ok() {
                created.push(name);
            }
        }

        let comparison = differ(&old, &new).compare().unwrap();
        assert_eq!(comparison.changes.len(), created.len());

        let rows: Vec<AuditRow> = comparison
            .changes
            .into_iter()
            .map(|c| AuditRow::new(c, ProvenanceResult::unknown()))
            .collect();
        let csv = report::render_csv(&rows);
        if created.contains(&"file,with,commas.txt") {
            assert!(csv.contains("\"file,with,commas.txt\""));
        }
        if created.contains(&"file\"quoted\".txt") {
            assert!(csv.contains("\"file\"\"quoted\"\".txt\""));
        }
    }

    #[test]
    fn test_empty_file_added() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();
        fs::write(new.path().join("empty.txt"), "").unwrap();

        let comparison = differ(&old, &new).compare().unwrap();
        assert_eq!(comparison.changes[0].kind, ChangeKind::Added);
        assert_eq!(comparison.changes[0].magnitude, Magnitude::DiffLines(0));
    }

    #[test]
    fn test_missing_root_is_error() {
        let old = TempDir::new().unwrap();
        let missing = old.path().join("does-not-exist");

        let err = SnapshotDiffer::new(old.path().to_path_buf(), missing)
            .compare()
            .unwrap_err();
        assert!(matches!(err, ProvenantError::WalkDir(_)));
    }

    #[test]
    fn test_excluded_paths_ignored_on_both_sides() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();
        fs::create_dir_all(new.path().join(".git/objects")).unwrap();
        fs::write(new.path().join(".git/objects/abc"), "blob").unwrap();
        fs::create_dir_all(old.path().join("cache")).unwrap();
        fs::write(old.path().join("cache/page.html"), "<html>").unwrap();

        let exclude = snapshot::build_globset(&["**/.git/**".to_string(), "cache/**".to_string()]).unwrap();
        let comparison = differ(&old, &new).with_exclude_set(exclude).compare().unwrap();
        assert!(comparison.changes.is_empty());
    }
}
