//! Integration tests for provenant
//!
//! Full audits over generated site trees, with remote archives and
//! repositories served from memory.

use ::provenant::remote::Fetcher;
use ::provenant::vcs::{CommitId, VcsClient, VcsRepository};
use ::provenant::*;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const CORE_URL: &str = "https://wordpress.org/latest.zip";

/// Serves registered URLs and counts every request
#[derive(Default)]
pub struct RecordingFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    pub fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| u.as_str() == url).count()
    }
}

impl Fetcher for RecordingFetcher {
    fn fetch(&self, url: &str) -> provenant::Result<Option<Vec<u8>>> {
        self.requests.lock().push(url.to_string());
        Ok(self.responses.get(url).cloned())
    }
}

/// Repository with a fixed history, newest commit first
#[derive(Clone, Default)]
pub struct StaticRepository {
    commits: Vec<(String, HashMap<String, Vec<u8>>)>,
}

impl StaticRepository {
    pub fn commit(mut self, id: &str, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        self.commits.push((id.to_string(), files));
        self
    }
}

impl VcsRepository for StaticRepository {
    fn commits_touching(&self, path: &str) -> provenant::Result<Vec<CommitId>> {
        Ok(self
            .commits
            .iter()
            .filter(|(_, files)| files.contains_key(path))
            .map(|(id, _)| CommitId::new(id.as_str()))
            .collect())
    }

    fn read_blob(&self, commit: &CommitId, path: &str) -> provenant::Result<Option<Vec<u8>>> {
        Ok(self
            .commits
            .iter()
            .find(|(id, _)| id == commit.as_str())
            .and_then(|(_, files)| files.get(path).cloned()))
    }
}

pub struct StaticVcs(pub StaticRepository);

impl VcsClient for StaticVcs {
    fn clone_shallow(&self, _url: &str, _depth: u32) -> provenant::Result<Box<dyn VcsRepository>> {
        Ok(Box::new(self.0.clone()))
    }
}

/// Build a ZIP archive in memory
pub fn archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options =
            zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

/// Old and new snapshot trees for one audit
pub struct AuditHarness {
    pub old: TempDir,
    pub new: TempDir,
    pub file_generator: FileGenerator,
}

impl AuditHarness {
    pub fn new() -> Self {
        Self {
            old: TempDir::new().unwrap(),
            new: TempDir::new().unwrap(),
            file_generator: FileGenerator::new(42),
        }
    }

    /// Write the same file into both snapshots
    pub fn both(&self, path: &str, content: &str) {
        write_file(self.old.path(), path, content.as_bytes());
        write_file(self.new.path(), path, content.as_bytes());
    }

    pub fn old_only(&self, path: &str, content: &str) {
        write_file(self.old.path(), path, content.as_bytes());
    }

    pub fn new_only(&self, path: &str, content: &str) {
        write_file(self.new.path(), path, content.as_bytes());
    }

    /// Fill both snapshots with identical generated files
    pub fn generate_site(&mut self, dirs: usize, files_per_dir: usize) -> Vec<String> {
        let mut paths = Vec::new();
        for d in 0..dirs {
            for f in 0..files_per_dir {
                let path = format!("dir_{d}/file_{f}.txt");
                let content = self.file_generator.generate_file_content(50..2_000);
                write_file(self.old.path(), &path, &content);
                write_file(self.new.path(), &path, &content);
                paths.push(path);
            }
        }
        paths
    }

    pub fn audit(&self, config: AuditConfig, fetcher: Arc<dyn Fetcher>, vcs: Arc<dyn VcsClient>) -> AuditReport {
        AuditBuilder::new()
            .config(config)
            .fetcher(fetcher)
            .vcs(vcs)
            .build(self.new.path().to_path_buf())
            .unwrap()
            .run(self.old.path())
            .unwrap()
    }

    pub fn source_of(report: &AuditReport, path: &str) -> ProvenanceResult {
        report
            .rows
            .iter()
            .find(|r| r.path().as_str() == path)
            .map(|r| r.provenance.clone())
            .unwrap_or_else(|| panic!("no row for {path}"))
    }
}

impl Default for AuditHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_file(root: &Path, path: &str, content: &[u8]) {
    let full: PathBuf = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// File generator for test data
pub struct FileGenerator {
    rng: StdRng,
}

impl FileGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate line-oriented text content
    pub fn generate_file_content(&mut self, size_range: std::ops::Range<usize>) -> Vec<u8> {
        let size = self.rng.random_range(size_range);
        let mut content = Vec::with_capacity(size);

        let words = ["<?php", "echo", "function", "return", "$post", "wp_die", "array", "null", "true"];
        while content.len() < size {
            let word = words[self.rng.random_range(0..words.len())];
            content.extend_from_slice(word.as_bytes());
            content.push(if self.rng.random_bool(0.2) { b'\n' } else { b' ' });
        }

        content.truncate(size);
        content
    }

    /// Generate binary content
    pub fn generate_binary_content(&mut self, size: usize) -> Vec<u8> {
        let mut content = vec![0u8; size];
        self.rng.fill(&mut content[..]);
        content[0] = 0;
        content
    }

    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

fn config(json: &str) -> AuditConfig {
    AuditConfig::from_json(json).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_full_site_audit() {
        let harness = AuditHarness::new();
        harness.both("index.php", "<?php // front controller");
        harness.old_only("wp-includes/version.php", "<?php $wp_version = '6.4';");
        harness.new_only("wp-includes/version.php", "<?php $wp_version = '6.5';");
        harness.new_only("wp-content/plugins/akismet/akismet.php", "<?php /* Akismet */");
        harness.new_only("wp-content/uploads/shell.php", "<?php eval($_POST['x']);");
        harness.old_only("readme.html", "<html>");

        let fetcher = Arc::new(
            RecordingFetcher::default()
                .serve(CORE_URL, archive(&[("wordpress/wp-includes/version.php", "<?php $wp_version = '6.5';")]))
                .serve(
                    "https://downloads.wordpress.org/plugin/akismet.latest-stable.zip",
                    archive(&[("akismet/akismet.php", "<?php /* Akismet */")]),
                ),
        );
        let report = harness.audit(
            config(
                r#"{"sources": [
                    {"name": "Core", "type": "core_package", "config": {}},
                    {"name": "Plugins", "type": "named_package", "config": {"relativePath": "wp-content/plugins"}}
                ], "parallelWorkers": 1}"#,
            ),
            fetcher.clone(),
            Arc::new(StaticVcs(StaticRepository::default())),
        );

        assert_eq!(report.summary.files_added, 2);
        assert_eq!(report.summary.files_modified, 1);
        assert_eq!(report.summary.files_removed, 1);
        assert_eq!(report.summary.files_unchanged, 1);

        assert_eq!(
            AuditHarness::source_of(&report, "wp-includes/version.php"),
            ProvenanceResult::new("Vendor Source", "https://wordpress.org/")
        );
        assert_eq!(
            AuditHarness::source_of(&report, "wp-content/plugins/akismet/akismet.php"),
            ProvenanceResult::new("Vendor Source", "https://wordpress.org/plugins/akismet/")
        );
        assert!(AuditHarness::source_of(&report, "wp-content/uploads/shell.php").is_unknown());
        assert_eq!(
            AuditHarness::source_of(&report, "readme.html"),
            ProvenanceResult::file_deleted()
        );
        assert_eq!(fetcher.count(CORE_URL), 1);

        let out = TempDir::new().unwrap();
        let csv_path = out.path().join("report.csv");
        report.write_csv(&csv_path).unwrap();
        let csv = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0], "File,Changes,Source,Additional Info");
        assert_eq!(lines[1], "readme.html,File Removed,File Deleted,");
        assert_eq!(lines[2], "wp-content/plugins/akismet/akismet.php,4,Vendor Source,https://wordpress.org/plugins/akismet/");
        assert!(lines[3].starts_with("wp-content/uploads/shell.php,4,Unknown,"));
        assert!(lines[4].starts_with("wp-includes/version.php,5,Vendor Source,"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_mtime_only_change_is_not_modified() {
        let mut harness = AuditHarness::new();
        let paths = harness.generate_site(3, 4);

        for path in &paths {
            let full = harness.new.path().join(path);
            filetime::set_file_mtime(&full, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
        }

        let comparison = SnapshotDiffer::new(harness.old.path().to_path_buf(), harness.new.path().to_path_buf())
            .compare()
            .unwrap();
        assert!(comparison.changes.is_empty());
        assert_eq!(comparison.summary.files_unchanged, paths.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_only_change_is_not_modified() {
        use std::os::unix::fs::PermissionsExt;

        let mut harness = AuditHarness::new();
        let paths = harness.generate_site(3, 4);

        for (i, path) in paths.iter().enumerate() {
            let mode = if i % 2 == 0 { 0o600 } else { 0o755 };
            fs::set_permissions(harness.new.path().join(path), fs::Permissions::from_mode(mode)).unwrap();
        }

        let comparison = SnapshotDiffer::new(harness.old.path().to_path_buf(), harness.new.path().to_path_buf())
            .compare()
            .unwrap();
        assert!(comparison.changes.is_empty());
        assert_eq!(comparison.summary.files_unchanged, paths.len());
    }

    #[test]
    fn test_local_mirror_scenario() {
        let harness = AuditHarness::new();
        let reference = TempDir::new().unwrap();
        write_file(reference.path(), "x.php", b"<?php // vendored");
        write_file(reference.path(), "y.php", b"<?php // upstream");
        harness.new_only("vendor/x.php", "<?php // vendored");
        harness.new_only("vendor/y.php", "<?php // tampered");

        let json = format!(
            r#"{{"sources": [{{"name": "Vendor", "class": "sources.local_files.LocalFilesSource",
                "config": {{"relativePath": "vendor", "referencePath": {:?},
                            "sourceType": "Composer", "sourceAdditional": "acme/lib 2.1"}}}}]}}"#,
            reference.path().to_string_lossy()
        );
        let report = harness.audit(
            config(&json),
            Arc::new(RecordingFetcher::default()),
            Arc::new(StaticVcs(StaticRepository::default())),
        );

        assert_eq!(
            AuditHarness::source_of(&report, "vendor/x.php"),
            ProvenanceResult::new("Composer", "acme/lib 2.1")
        );
        assert!(AuditHarness::source_of(&report, "vendor/y.php").is_unknown());
    }

    #[test]
    fn test_git_mirror_and_priority() {
        let harness = AuditHarness::new();
        let reference = TempDir::new().unwrap();
        write_file(reference.path(), "style.css", b"body { color: red }");
        harness.new_only("wp-content/themes/acme/style.css", "body { color: red }");
        harness.new_only("wp-content/themes/acme/functions.php", "<?php // v1");

        let repo = StaticRepository::default()
            .commit("bbb222", &[("style.css", "body { color: blue }"), ("functions.php", "<?php // v2")])
            .commit("aaa111", &[("style.css", "body { color: red }"), ("functions.php", "<?php // v1")]);

        let json = format!(
            r#"{{"sources": [
                {{"name": "Theme repo", "type": "git_mirror",
                  "config": {{"gitUrl": "https://github.com/acme/theme/", "relativePath": "wp-content/themes/acme"}}}},
                {{"name": "Theme copy", "type": "local_mirror",
                  "config": {{"relativePath": "wp-content/themes/acme", "referencePath": {:?},
                              "sourceType": "Local copy", "sourceAdditional": ""}}}}
            ]}}"#,
            reference.path().to_string_lossy()
        );
        let report = harness.audit(
            config(&json),
            Arc::new(RecordingFetcher::default()),
            Arc::new(StaticVcs(repo)),
        );

        assert_eq!(
            AuditHarness::source_of(&report, "wp-content/themes/acme/style.css"),
            ProvenanceResult::new("Vendor Software", "https://github.com/acme/theme/commit/aaa111")
        );
        assert_eq!(
            AuditHarness::source_of(&report, "wp-content/themes/acme/functions.php").info,
            "https://github.com/acme/theme/commit/aaa111"
        );
    }

    #[test]
    fn test_named_package_negative_cache_across_audit() {
        let harness = AuditHarness::new();
        harness.new_only("wp-content/plugins/in-house/a.php", "<?php // a");
        harness.new_only("wp-content/plugins/in-house/b.php", "<?php // b");
        harness.new_only("wp-content/plugins/in-house/lib/c.php", "<?php // c");

        let fetcher = Arc::new(RecordingFetcher::default());
        let report = harness.audit(
            config(
                r#"{"sources": [{"name": "Plugins", "type": "named_package",
                                 "config": {"relativePath": "wp-content/plugins"}}],
                    "parallelWorkers": 4}"#,
            ),
            fetcher.clone(),
            Arc::new(StaticVcs(StaticRepository::default())),
        );

        assert_eq!(report.unattributed().count(), 3);
        assert_eq!(
            fetcher.count("https://downloads.wordpress.org/plugin/in-house.latest-stable.zip"),
            1
        );
    }

    #[test]
    fn test_disabled_source_is_never_built() {
        let harness = AuditHarness::new();
        harness.new_only("index.php", "<?php");

        let fetcher = Arc::new(RecordingFetcher::default());
        let report = harness.audit(
            config(r#"{"sources": [{"name": "Core", "type": "core_package", "enabled": false, "config": {}}]}"#),
            fetcher.clone(),
            Arc::new(StaticVcs(StaticRepository::default())),
        );

        assert_eq!(fetcher.count(CORE_URL), 0);
        assert!(AuditHarness::source_of(&report, "index.php").is_unknown());
    }

    #[test]
    #[traced_test]
    fn test_random_mutations_are_all_reported() {
        let mut harness = AuditHarness::new();
        let mut paths = harness.generate_site(4, 8);
        let mut expected_modified = std::collections::BTreeSet::new();
        let mut expected_removed = std::collections::BTreeSet::new();

        for _ in 0..10 {
            let idx = harness.file_generator.pick(paths.len());
            let path = paths.remove(idx);
            if idx % 2 == 0 {
                fs::remove_file(harness.new.path().join(&path)).unwrap();
                expected_removed.insert(path);
            } else {
                let content = harness.file_generator.generate_binary_content(64);
                fs::write(harness.new.path().join(&path), content).unwrap();
                expected_modified.insert(path);
            }
        }

        let report = harness.audit(
            AuditConfig::default(),
            Arc::new(RecordingFetcher::default()),
            Arc::new(StaticVcs(StaticRepository::default())),
        );

        let of_kind = |kind: ChangeKind| -> std::collections::BTreeSet<String> {
            report
                .rows
                .iter()
                .filter(|r| r.change.kind == kind)
                .map(|r| r.path().to_string())
                .collect()
        };
        assert_eq!(of_kind(ChangeKind::Removed), expected_removed);
        assert_eq!(of_kind(ChangeKind::Modified), expected_modified);
        assert!(report
            .rows
            .iter()
            .filter(|r| r.change.kind == ChangeKind::Modified)
            .all(|r| r.change.magnitude == Magnitude::Binary));
    }
}
