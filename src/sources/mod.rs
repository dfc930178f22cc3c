//! Provenance sources
//!
//! A provenance source answers one question for a changed file: "do I know where
//! this exact content came from?" Every variant implements [`ProvenanceSource`]
//! and is bound at construction to the root of the new snapshot plus its own
//! settings. Any expensive setup (archive download, repository clone) happens in
//! the constructor, so a source that exists is ready to answer.
//!
//! ## Variants
//!
//! | Type name       | Implementation                          | Scope                         |
//! |-----------------|-----------------------------------------|-------------------------------|
//! | `local_mirror`  | [`local_mirror::LocalMirrorSource`]     | files under `relativePath`    |
//! | `git_mirror`    | [`git_mirror::GitMirrorSource`]         | files under `relativePath`    |
//! | `core_package`  | [`core_package::CorePackageSource`]     | all files                     |
//! | `named_package` | [`named_package::NamedPackageSource`]   | `relativePath/<identifier>/…` |
//!
//! Type names are resolved to a [`SourceKind`] while the configuration is
//! parsed; there is no dynamic loading.
//!
//! ## Result shape
//!
//! [`ProvenanceSource::resolve`] returns `Result<Option<ProvenanceResult>>`:
//! `Ok(Some(_))` is a match, `Ok(None)` is "not mine", and `Err(_)` is a failure
//! (typically the on-disk file could not be read) that callers must not mistake
//! for "no match".

pub mod core_package;
pub mod git_mirror;
pub mod local_mirror;
pub mod named_package;

use crate::error::{ProvenantError, Result};
use crate::remote::Fetcher;
use crate::types::{ProvenanceResult, RelativePath};
use crate::vcs::VcsClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use core_package::CorePackageSource;
pub use git_mirror::GitMirrorSource;
pub use local_mirror::LocalMirrorSource;
pub use named_package::NamedPackageSource;

/// Default label for matches against vendor releases
pub const VENDOR_SOURCE_LABEL: &str = "Vendor Source";

/// A configured origin that can claim changed files
pub trait ProvenanceSource: Send + Sync {
    /// Configured name, used in logs and errors
    fn name(&self) -> &str;

    /// Variant of this source
    fn kind(&self) -> SourceKind;

    /// Attribute `path` (relative to the new snapshot root) to this source
    fn resolve(&self, path: &RelativePath) -> Result<Option<ProvenanceResult>>;
}

/// Closed set of source variants known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Byte comparison against a local reference tree
    LocalMirror,
    /// Historical blob comparison against a cloned repository
    GitMirror,
    /// Hash comparison against a single release archive
    CorePackage,
    /// Hash comparison against per-identifier package archives
    NamedPackage,
}

impl SourceKind {
    /// All variants
    pub const ALL: [SourceKind; 4] = [
        SourceKind::LocalMirror,
        SourceKind::GitMirror,
        SourceKind::CorePackage,
        SourceKind::NamedPackage,
    ];

    /// Canonical configuration name
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceKind::LocalMirror => "local_mirror",
            SourceKind::GitMirror => "git_mirror",
            SourceKind::CorePackage => "core_package",
            SourceKind::NamedPackage => "named_package",
        }
    }

    /// Look up a configuration type name
    ///
    /// Accepts the canonical names and the dotted class paths used by older
    /// configuration files.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "local_mirror" | "sources.local_files.LocalFilesSource" => Some(SourceKind::LocalMirror),
            "git_mirror" | "sources.git_repo.GitHubRepoSource" => Some(SourceKind::GitMirror),
            "core_package" | "sources.wordpress_core.WordpressCoreSource" => Some(SourceKind::CorePackage),
            "named_package" | "sources.wordpress_plugin.WordpressPluginSource" => {
                Some(SourceKind::NamedPackage)
            }
            _ => None,
        }
    }

    /// Construct a source of this kind, performing its eager setup
    pub fn build(
        &self,
        name: &str,
        settings: &SourceSettings,
        env: &SourceEnvironment,
    ) -> Result<Box<dyn ProvenanceSource>> {
        Ok(match self {
            SourceKind::LocalMirror => Box::new(LocalMirrorSource::from_settings(name, settings, env)?),
            SourceKind::GitMirror => Box::new(GitMirrorSource::from_settings(name, settings, env)?),
            SourceKind::CorePackage => Box::new(CorePackageSource::from_settings(name, settings, env)?),
            SourceKind::NamedPackage => Box::new(NamedPackageSource::from_settings(name, settings, env)?),
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Shared collaborators handed to every source at construction
#[derive(Clone)]
pub struct SourceEnvironment {
    /// Root of the new snapshot
    pub base_path: PathBuf,
    /// Remote retrieval
    pub fetcher: Arc<dyn Fetcher>,
    /// Version-control client
    pub vcs: Arc<dyn VcsClient>,
}

impl fmt::Debug for SourceEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEnvironment")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

/// Variant-specific settings from a source descriptor's `config` map
///
/// Keys may be written in camelCase (`relativePath`) or snake_case
/// (`relative_path`); both spellings are looked up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSettings(Map<String, Value>);

impl SourceSettings {
    /// Wrap a JSON object
    pub fn new(map: Map<String, Value>) -> Self {
        SourceSettings(map)
    }

    /// Builder-style insert, mostly for tests and programmatic setup
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Optional string setting
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::Configuration`] if the key is present but not a string
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        let snake = camel_to_snake(key);
        let value = self.0.get(key).or_else(|| self.0.get(&snake));
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ProvenantError::configuration(format!(
                "'{}' must be a string, got {}",
                key, other
            ))),
        }
    }

    /// Required string setting
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::Configuration`] naming the source and the missing key
    pub fn require_str(&self, source_name: &str, key: &str) -> Result<String> {
        self.get_str(key)?.ok_or_else(|| {
            ProvenantError::configuration(format!("source '{}': {} must be set", source_name, key))
        })
    }

    /// Optional unsigned integer setting
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        let snake = camel_to_snake(key);
        match self.0.get(key).or_else(|| self.0.get(&snake)) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| ProvenantError::configuration(format!("'{}' is out of range", key))),
            Some(other) => Err(ProvenantError::configuration(format!(
                "'{}' must be a number, got {}",
                key, other
            ))),
        }
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Normalize a configured subtree path to `/`-separated form without edge slashes
pub(crate) fn normalize_subtree(path: &str) -> String {
    RelativePath::new(path).as_str().to_string()
}
