//! Snapshot differencing
//!
//! [`SnapshotDiffer`] lists an old and a new snapshot and classifies every path
//! in their union as Added, Removed, Modified or Unchanged. Only the first three
//! produce a [`ChangeRecord`]; records come back sorted by path.
//!
//! Modification is decided on content alone: sizes first, then a byte-for-byte
//! comparison. Timestamps and permissions never make a file Modified.
//!
//! A file that was listed but cannot be read when it is compared (deleted or
//! locked in between) aborts the comparison with [`ProvenantError::FileRead`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use provenant::compare::SnapshotDiffer;
//! use std::path::PathBuf;
//!
//! # fn example() -> provenant::Result<()> {
//! let comparison = SnapshotDiffer::new(PathBuf::from("baseline"), PathBuf::from("live")).compare()?;
//! for change in &comparison.changes {
//!     println!("{} {} ({})", change.kind, change.path, change.magnitude);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`ProvenantError::FileRead`]: crate::error::ProvenantError::FileRead

use crate::diff::{self, DiffOptions};
use crate::error::{ProvenantError, Result};
use crate::snapshot::{Snapshot, SnapshotWalker};
use crate::types::{ChangeKind, ChangeRecord, ChangeSummary, Magnitude, RelativePath};
use crate::utils;
use globset::GlobSet;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Interval at which comparison progress is logged
const PROGRESS_LOG_INTERVAL: usize = 1000;

/// Result of comparing two snapshots
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    /// One record per differing path, sorted by path
    pub changes: Vec<ChangeRecord>,
    /// Aggregate counts
    pub summary: ChangeSummary,
}

impl Comparison {
    /// Records of one kind
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }
}

/// Compares an old and a new snapshot root
#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    old_root: PathBuf,
    new_root: PathBuf,
    exclude: Option<GlobSet>,
    parallel_workers: usize,
    diff_options: DiffOptions,
}

impl SnapshotDiffer {
    /// Create a differ with sequential comparison and no exclusions
    pub fn new(old_root: PathBuf, new_root: PathBuf) -> Self {
        Self {
            old_root,
            new_root,
            exclude: None,
            parallel_workers: 1,
            diff_options: DiffOptions::default(),
        }
    }

    /// Exclude paths matching this glob set from both snapshots
    pub fn with_exclude_set(mut self, exclude: Option<GlobSet>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Compare common files on this many worker threads (minimum 1)
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Options for magnitude computation
    pub fn with_diff_options(mut self, options: DiffOptions) -> Self {
        self.diff_options = options;
        self
    }

    /// List both snapshots and classify every path
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::WalkDir`] if either root cannot be listed
    /// - [`ProvenantError::FileRead`] if a listed file cannot be read
    pub fn compare(&self) -> Result<Comparison> {
        let start = Instant::now();

        let old = SnapshotWalker::new(self.old_root.clone())
            .with_exclude_set(self.exclude.clone())
            .scan()?;
        let new = SnapshotWalker::new(self.new_root.clone())
            .with_exclude_set(self.exclude.clone())
            .scan()?;
        info!("Old files: {}", old.len());
        info!("New files: {}", new.len());

        let comparison = self.compare_snapshots(&old, &new)?;
        info!(
            "Compared snapshots in {:?}: {} added, {} removed, {} modified, {} unchanged",
            start.elapsed(),
            comparison.summary.files_added,
            comparison.summary.files_removed,
            comparison.summary.files_modified,
            comparison.summary.files_unchanged
        );
        Ok(comparison)
    }

    /// Classify paths of two already-listed snapshots
    pub fn compare_snapshots(&self, old: &Snapshot, new: &Snapshot) -> Result<Comparison> {
        let mut summary = ChangeSummary::default();
        let mut changes = Vec::new();

        for path in new.paths().filter(|p| !old.contains(p)) {
            let new_path = new.native_path(path);
            let content = read_snapshot_file(&new_path)?;
            summary.files_added += 1;
            summary.bytes_added += content.len() as u64;
            changes.push(ChangeRecord {
                path: path.clone(),
                kind: ChangeKind::Added,
                magnitude: diff::magnitude_with(&[], &content, &self.diff_options),
                size: content.len() as u64,
            });
        }

        for path in old.paths().filter(|p| !new.contains(p)) {
            let size = old.size_of(path).unwrap_or(0);
            summary.files_removed += 1;
            summary.bytes_removed += size;
            changes.push(ChangeRecord {
                path: path.clone(),
                kind: ChangeKind::Removed,
                magnitude: Magnitude::None,
                size,
            });
        }

        let common: Vec<&RelativePath> = old.paths().filter(|p| new.contains(p)).collect();
        debug!("Comparing {} files...", common.len());
        let modified = self.find_modified(old, new, &common)?;
        summary.files_unchanged = common.len() - modified.len();
        summary.files_modified = modified.len();
        changes.extend(modified);

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Comparison { changes, summary })
    }

    fn find_modified(
        &self,
        old: &Snapshot,
        new: &Snapshot,
        common: &[&RelativePath],
    ) -> Result<Vec<ChangeRecord>> {
        let compared = AtomicUsize::new(0);
        let check = |path: &RelativePath| -> Result<Option<ChangeRecord>> {
            let done = compared.fetch_add(1, Ordering::Relaxed);
            if done > 0 && done % PROGRESS_LOG_INTERVAL == 0 {
                debug!("Compared {} files...", done);
            }
            self.compare_common(path, &old.native_path(path), &new.native_path(path))
        };

        let results: Vec<Result<Option<ChangeRecord>>> = if self.parallel_workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.parallel_workers)
                .build()
                .map_err(|e| ProvenantError::internal(format!("Failed to build thread pool: {}", e)))?;
            pool.install(|| common.par_iter().map(|p| check(*p)).collect())
        } else {
            common.iter().map(|p| check(*p)).collect()
        };

        let mut modified = Vec::new();
        for result in results {
            if let Some(record) = result? {
                modified.push(record);
            }
        }
        Ok(modified)
    }

    fn compare_common(
        &self,
        path: &RelativePath,
        old_path: &Path,
        new_path: &Path,
    ) -> Result<Option<ChangeRecord>> {
        if utils::files_identical(old_path, new_path)? {
            return Ok(None);
        }

        let old_content = read_snapshot_file(old_path)?;
        let new_content = read_snapshot_file(new_path)?;
        Ok(Some(ChangeRecord {
            path: path.clone(),
            kind: ChangeKind::Modified,
            magnitude: diff::magnitude_with(&old_content, &new_content, &self.diff_options),
            size: new_content.len() as u64,
        }))
    }
}

fn read_snapshot_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| ProvenantError::file_read(path, e))
}
