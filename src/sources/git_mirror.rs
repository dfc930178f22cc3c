//! Version-control mirror
//!
//! Clones a remote repository once, at construction, then claims a file under
//! `relativePath` if any historical version of the corresponding repository
//! path is byte-identical to it. Commits are scanned newest first; the first
//! identical version wins and its permalink becomes the result info.

use super::{normalize_subtree, ProvenanceSource, SourceEnvironment, SourceKind, SourceSettings};
use crate::error::{ProvenantError, Result};
use crate::types::{ProvenanceResult, RelativePath};
use crate::utils;
use crate::vcs::{CommitId, VcsClient, VcsRepository};
use std::path::PathBuf;
use tracing::{debug, info, trace};

/// Label used when none is configured
pub const DEFAULT_LABEL: &str = "Vendor Software";

/// Historical blob comparison against a cloned repository
pub struct GitMirrorSource {
    name: String,
    base_path: PathBuf,
    relative_path: String,
    git_url: String,
    label: String,
    repository: Box<dyn VcsRepository>,
}

impl std::fmt::Debug for GitMirrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitMirrorSource")
            .field("name", &self.name)
            .field("relative_path", &self.relative_path)
            .field("git_url", &self.git_url)
            .finish_non_exhaustive()
    }
}

impl GitMirrorSource {
    /// Clone `git_url` and bind it to the files under `relative_path`
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::SourceInitialization`] if the clone fails
    pub fn new(
        name: impl Into<String>,
        base_path: PathBuf,
        relative_path: &str,
        git_url: impl Into<String>,
        depth: u32,
        vcs: &dyn VcsClient,
    ) -> Result<Self> {
        let name = name.into();
        let git_url = git_url.into();
        info!("Source '{}': cloning {}", name, git_url);
        let repository = vcs
            .clone_shallow(&git_url, depth)
            .map_err(|e| ProvenantError::source_init(&name, e))?;

        Ok(Self {
            name,
            base_path,
            relative_path: normalize_subtree(relative_path),
            git_url,
            label: DEFAULT_LABEL.to_string(),
            repository,
        })
    }

    /// Override the result label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Build from descriptor settings
    ///
    /// Requires `gitUrl` and `relativePath`; `label` and `depth` are optional.
    pub fn from_settings(name: &str, settings: &SourceSettings, env: &SourceEnvironment) -> Result<Self> {
        let git_url = settings.require_str(name, "gitUrl")?;
        let relative_path = settings.require_str(name, "relativePath")?;
        let depth = settings.get_u32("depth")?.unwrap_or(1);
        let label = settings.get_str("label")?;

        let source = Self::new(name, env.base_path.clone(), &relative_path, git_url, depth, env.vcs.as_ref())?;
        Ok(match label {
            Some(label) => source.with_label(label),
            None => source,
        })
    }

    /// Permalink to `commit` on the remote
    pub fn permalink(&self, commit: &CommitId) -> String {
        let base = self.git_url.trim_end_matches('/');
        let base = base.strip_suffix(".git").unwrap_or(base);
        format!("{}/commit/{}", base, commit)
    }
}

impl ProvenanceSource for GitMirrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::GitMirror
    }

    fn resolve(&self, path: &RelativePath) -> Result<Option<ProvenanceResult>> {
        let Some(repo_path) = path.strip_dir_prefix(&self.relative_path) else {
            return Ok(None);
        };

        let on_disk = path.to_native(&self.base_path);
        let commits = self.repository.commits_touching(repo_path)?;
        trace!("{} commits touch {}", commits.len(), repo_path);

        for commit in commits {
            let Some(blob) = self.repository.read_blob(&commit, repo_path)? else {
                continue;
            };
            if utils::file_matches_bytes(&on_disk, &blob)? {
                debug!("{} matches {} at {}", path, self.git_url, commit);
                return Ok(Some(ProvenanceResult::new(&self.label, self.permalink(&commit))));
            }
        }
        Ok(None)
    }
}
