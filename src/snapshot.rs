//! Snapshot listing
//!
//! A [`Snapshot`] is the set of regular files beneath a root directory, keyed by
//! their `/`-separated root-relative path. Directories are traversed
//! recursively; symbolic links are not followed and, like every other non-file
//! entry, are not tracked.
//!
//! Unlike checkpointing tools, an audit must see everything that is deployed, so
//! `.gitignore` and hidden-file rules are deliberately not applied. Only the
//! explicit exclude patterns configured by the user filter the listing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use provenant::snapshot::SnapshotWalker;
//! use std::path::PathBuf;
//!
//! # fn example() -> provenant::Result<()> {
//! let snapshot = SnapshotWalker::new(PathBuf::from("/srv/www"))
//!     .with_exclude_patterns(&["**/.git/**".to_string()])?
//!     .scan()?;
//! println!("{} files", snapshot.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{ProvenantError, Result};
use crate::types::RelativePath;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Regular files under a root, with their sizes at listing time
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    root: PathBuf,
    files: BTreeMap<RelativePath, u64>,
}

impl Snapshot {
    /// Root directory of the snapshot
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `path` is part of the snapshot
    pub fn contains(&self, path: &RelativePath) -> bool {
        self.files.contains_key(path)
    }

    /// Size recorded for `path` at listing time
    pub fn size_of(&self, path: &RelativePath) -> Option<u64> {
        self.files.get(path).copied()
    }

    /// Paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.files.keys()
    }

    /// Filesystem location of `path` in this snapshot
    pub fn native_path(&self, path: &RelativePath) -> PathBuf {
        path.to_native(&self.root)
    }
}

/// Recursive lister for one snapshot root
#[derive(Debug, Clone)]
pub struct SnapshotWalker {
    root: PathBuf,
    exclude: Option<GlobSet>,
}

impl SnapshotWalker {
    /// Create a walker with no exclusions
    pub fn new(root: PathBuf) -> Self {
        Self { root, exclude: None }
    }

    /// Exclude root-relative paths matching any of these glob patterns
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::InvalidPattern`] if a pattern does not compile
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = build_globset(patterns)?;
        Ok(self)
    }

    /// Use an already compiled exclude set
    pub fn with_exclude_set(mut self, exclude: Option<GlobSet>) -> Self {
        self.exclude = exclude;
        self
    }

    /// List every regular file under the root
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::WalkDir`] if the root or any directory beneath it cannot be read
    pub fn scan(&self) -> Result<Snapshot> {
        let start = Instant::now();
        let mut files = BTreeMap::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry.path()));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                trace!("Skipping non-file entry {:?}", entry.path());
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|_| ProvenantError::internal(format!(
                    "Path {:?} is not under {:?}",
                    entry.path(),
                    self.root
                )))?;
            let size = entry.metadata()?.len();
            files.insert(RelativePath::from_path(relative), size);
        }

        debug!(
            "Listed {} files under {:?} in {:?}",
            files.len(),
            self.root,
            start.elapsed()
        );

        Ok(Snapshot {
            root: self.root.clone(),
            files,
        })
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        match path.strip_prefix(&self.root) {
            Ok(relative) => exclude.is_match(RelativePath::from_path(relative).as_str()),
            Err(_) => false,
        }
    }
}

/// Compile exclude patterns, returning `None` for an empty list
pub fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ProvenantError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| ProvenantError::InvalidPattern(e.to_string()))
}
