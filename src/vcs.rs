//! Version-control access for mirror sources
//!
//! The git mirror source needs a narrow capability: clone a remote repository
//! read-only, list the commits that touched a path, and read a path as of a
//! commit. [`VcsClient`] and [`VcsRepository`] express that; [`GitCli`] is the
//! production implementation and drives the `git` executable.
//!
//! Commit order is pinned rather than left to the client's default: newest
//! first by commit date (`git log --date-order`), so the first byte-identical
//! historical version found is also the most recent one.

use crate::error::{ProvenantError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, trace};

/// Full commit identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    /// Wrap a commit hash
    pub fn new(id: impl Into<String>) -> Self {
        CommitId(id.into())
    }

    /// Hex form of the id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// "Clone a remote repository read-only"
pub trait VcsClient: Send + Sync {
    /// Clone `url` keeping at most `depth` commits of history
    fn clone_shallow(&self, url: &str, depth: u32) -> Result<Box<dyn VcsRepository>>;
}

/// A read-only local clone
pub trait VcsRepository: Send + Sync {
    /// Commits touching `path`, newest first by commit date
    fn commits_touching(&self, path: &str) -> Result<Vec<CommitId>>;

    /// Content of `path` as of `commit`, or `None` if it did not exist there
    fn read_blob(&self, commit: &CommitId, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Client backed by the `git` command-line tool
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl VcsClient for GitCli {
    fn clone_shallow(&self, url: &str, depth: u32) -> Result<Box<dyn VcsRepository>> {
        let checkout = TempDir::new()?;
        info!("Cloning {} (depth {}) into {:?}", url, depth, checkout.path());
        let start = Instant::now();

        let output = Command::new(&self.program)
            .arg("clone")
            .arg("--quiet")
            .arg("--no-checkout")
            .arg(format!("--depth={}", depth.max(1)))
            .arg("--")
            .arg(url)
            .arg(checkout.path())
            .output()
            .map_err(|e| ProvenantError::vcs(format!("failed to run {:?}: {}", self.program, e)))?;
        check_status(&output, "clone")?;

        debug!("Cloned {} in {:?}", url, start.elapsed());
        Ok(Box::new(GitRepository {
            program: self.program.clone(),
            checkout,
        }))
    }
}

/// A clone living in a temporary directory for the lifetime of the handle
#[derive(Debug)]
struct GitRepository {
    program: PathBuf,
    checkout: TempDir,
}

impl GitRepository {
    fn git(&self, args: &[&str]) -> Result<Output> {
        trace!("git {:?}", args);
        // Paths are matched as written, never as pathspec globs
        Command::new(&self.program)
            .arg("--literal-pathspecs")
            .arg("-C")
            .arg(self.checkout.path())
            .args(args)
            .output()
            .map_err(|e| ProvenantError::vcs(format!("failed to run {:?}: {}", self.program, e)))
    }

    fn dir(&self) -> &Path {
        self.checkout.path()
    }
}

impl VcsRepository for GitRepository {
    fn commits_touching(&self, path: &str) -> Result<Vec<CommitId>> {
        let output = self.git(&["log", "--date-order", "--format=%H", "HEAD", "--", path])?;
        check_status(&output, "log")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(CommitId::new)
            .collect())
    }

    fn read_blob(&self, commit: &CommitId, path: &str) -> Result<Option<Vec<u8>>> {
        let spec = format!("{}:{}", commit, path);
        let exists = self.git(&["cat-file", "-e", &spec])?;
        if !exists.status.success() {
            trace!("{} not present in {:?}", spec, self.dir());
            return Ok(None);
        }
        let output = self.git(&["cat-file", "blob", &spec])?;
        check_status(&output, "cat-file")?;
        Ok(Some(output.stdout))
    }
}

fn check_status(output: &Output, operation: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(ProvenantError::vcs(format!(
        "git {} failed ({}): {}",
        operation,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}
