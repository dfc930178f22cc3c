//! Audit orchestration
//!
//! An [`Audit`] is built once per run. Building constructs every enabled
//! provenance source (downloads, clones), so an unreachable resource fails the
//! run before any file is compared. [`Audit::run`] then diffs the baseline
//! against the live tree and attributes every added or modified file.
//!
//! ## Example
//!
//! ```rust,no_run
//! use provenant::{AuditBuilder, AuditConfig};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> provenant::Result<()> {
//! let config = AuditConfig::load(Path::new("config.json"))?;
//! let audit = AuditBuilder::new()
//!     .config(config)
//!     .parallel_workers(4)
//!     .build(PathBuf::from("/srv/www/live"))?;
//!
//! let report = audit.run(Path::new("/srv/backups/www-2024-05-01"))?;
//! report.write_csv(Path::new("report.csv"))?;
//! # Ok(())
//! # }
//! ```

use crate::compare::SnapshotDiffer;
use crate::config::AuditConfig;
use crate::error::{ProvenantError, Result};
use crate::remote::{Fetcher, HttpFetcher};
use crate::report::{self, AuditRow};
use crate::resolver::ProvenanceResolver;
use crate::snapshot::build_globset;
use crate::sources::SourceEnvironment;
use crate::types::{ChangeKind, ChangeRecord, ChangeSummary, ProgressCallback, ProgressInfo};
use crate::vcs::{GitCli, VcsClient};
use chrono::{DateTime, Utc};
use globset::GlobSet;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of one audit run
#[derive(Debug, Clone)]
pub struct AuditReport {
    /// Baseline snapshot root
    pub old_root: PathBuf,
    /// Live snapshot root
    pub new_root: PathBuf,
    /// When the run finished
    pub generated_at: DateTime<Utc>,
    /// Wall-clock time of compare plus resolve
    pub duration: Duration,
    /// Comparison counts
    pub summary: ChangeSummary,
    /// One row per changed path, sorted by path
    pub rows: Vec<AuditRow>,
}

impl AuditReport {
    /// Rows per provenance source type
    pub fn source_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.provenance.source_type.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Added or modified files no source could attribute
    pub fn unattributed(&self) -> impl Iterator<Item = &AuditRow> {
        self.rows.iter().filter(|r| r.provenance.is_unknown())
    }

    /// Write the CSV report
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        report::write_csv(path, &self.rows)
    }
}

/// A configured run, with every provenance source already initialized
pub struct Audit {
    new_root: PathBuf,
    resolver: ProvenanceResolver,
    exclude: Option<GlobSet>,
    parallel_workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Audit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Audit")
            .field("new_root", &self.new_root)
            .field("resolver", &self.resolver)
            .field("parallel_workers", &self.parallel_workers)
            .finish_non_exhaustive()
    }
}

impl Audit {
    /// Root of the live snapshot the sources are bound to
    pub fn new_root(&self) -> &Path {
        &self.new_root
    }

    /// The resolver chain
    pub fn resolver(&self) -> &ProvenanceResolver {
        &self.resolver
    }

    /// Compare `old_root` against the live tree and attribute every change
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::WalkDir`] if either root cannot be listed
    /// - [`ProvenantError::FileRead`] if a listed file becomes unreadable
    pub fn run(&self, old_root: &Path) -> Result<AuditReport> {
        let start = Instant::now();
        info!("Comparing {:?} and {:?}...", old_root, self.new_root);

        let comparison = SnapshotDiffer::new(old_root.to_path_buf(), self.new_root.clone())
            .with_exclude_set(self.exclude.clone())
            .with_parallel_workers(self.parallel_workers)
            .compare()?;
        info!("Changes: {}", comparison.changes.len());

        let rows = self.resolve_all(comparison.changes)?;
        let duration = start.elapsed();
        info!("Audit finished in {:?}", duration);

        Ok(AuditReport {
            old_root: old_root.to_path_buf(),
            new_root: self.new_root.clone(),
            generated_at: Utc::now(),
            duration,
            summary: comparison.summary,
            rows,
        })
    }

    fn resolve_all(&self, changes: Vec<ChangeRecord>) -> Result<Vec<AuditRow>> {
        let total = changes.len();
        let processed = AtomicUsize::new(0);

        let resolve_one = |change: ChangeRecord| -> Result<AuditRow> {
            let row = if change.kind == ChangeKind::Removed {
                AuditRow::removed(change)
            } else {
                let provenance = self.resolver.resolve(&change.path)?;
                debug!("{} -> {}", change.path, provenance.source_type);
                AuditRow::new(change, provenance)
            };
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(callback) = &self.progress_callback {
                callback(ProgressInfo {
                    operation: "Resolving provenance".to_string(),
                    current_item: Some(row.path().to_string()),
                    processed: done,
                    total: Some(total),
                });
            }
            Ok(row)
        };

        if self.parallel_workers > 1 && total > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.parallel_workers)
                .build()
                .map_err(|e| ProvenantError::internal(format!("Failed to build thread pool: {}", e)))?;
            // indexed collect keeps the differ's path order
            pool.install(|| changes.into_par_iter().map(resolve_one).collect())
        } else {
            changes.into_iter().map(resolve_one).collect()
        }
    }
}

/// Builder for [`Audit`]
///
/// Production collaborators ([`HttpFetcher`], [`GitCli`]) are used unless
/// others are supplied.
pub struct AuditBuilder {
    config: AuditConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    vcs: Option<Arc<dyn VcsClient>>,
    progress_callback: Option<ProgressCallback>,
}

impl AuditBuilder {
    /// Builder with an empty configuration (every change resolves to Unknown)
    pub fn new() -> Self {
        Self {
            config: AuditConfig::default(),
            fetcher: None,
            vcs: None,
            progress_callback: None,
        }
    }

    /// Use this configuration
    pub fn config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the worker count from the configuration
    pub fn parallel_workers(mut self, count: usize) -> Self {
        self.config.parallel_workers = Some(count.max(1));
        self
    }

    /// Add exclude patterns on top of the configuration's
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude.extend(patterns);
        self
    }

    /// Fetch remote artifacts through `fetcher`
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Clone repositories through `vcs`
    pub fn vcs(mut self, vcs: Arc<dyn VcsClient>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Report resolution progress
    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Initialize every enabled source against `new_root`
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::InvalidPattern`] for a bad exclude pattern
    /// - any error from [`ProvenanceResolver::from_descriptors`]
    pub fn build(self, new_root: PathBuf) -> Result<Audit> {
        self.config.validate()?;
        let exclude = build_globset(&self.config.exclude)?;

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };
        let vcs: Arc<dyn VcsClient> = self.vcs.unwrap_or_else(|| Arc::new(GitCli::new()));
        let env = SourceEnvironment {
            base_path: new_root.clone(),
            fetcher,
            vcs,
        };

        let resolver = ProvenanceResolver::from_descriptors(
            &self.config.sources,
            &env,
            self.config.fail_on_source_error,
        )?;
        info!("{} provenance sources ready", resolver.len());

        Ok(Audit {
            new_root,
            resolver,
            exclude,
            parallel_workers: self.config.workers(),
            progress_callback: self.progress_callback,
        })
    }
}

impl Default for AuditBuilder {
    fn default() -> Self {
        Self::new()
    }
}
