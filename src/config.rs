//! Audit configuration
//!
//! Loaded from a JSON document, `config.json` by default:
//!
//! ```json
//! {
//!   "sources": [
//!     { "name": "WordPress Core", "type": "core_package", "config": {} },
//!     { "name": "Plugins", "type": "named_package",
//!       "config": { "relativePath": "wp-content/plugins" } },
//!     { "name": "Theme", "type": "git_mirror", "enabled": false,
//!       "config": { "gitUrl": "https://github.com/acme/theme/", "relativePath": "wp-content/themes/acme" } }
//!   ],
//!   "exclude": ["**/.git/**"],
//!   "parallelWorkers": 4
//! }
//! ```
//!
//! Source type names are checked against the registry while loading, so a typo
//! fails before any download or clone starts.

use crate::error::{ProvenantError, Result};
use crate::sources::{SourceKind, SourceSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Default configuration file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// One configured provenance source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Display name, used in logs and errors
    pub name: String,
    /// Registry type name (`class` is accepted for older files)
    #[serde(rename = "type", alias = "class")]
    pub source_type: String,
    /// Disabled sources are never constructed
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Variant-specific settings
    #[serde(default)]
    pub config: SourceSettings,
}

impl SourceDescriptor {
    /// Descriptor for an enabled source
    pub fn new(name: impl Into<String>, kind: SourceKind, config: SourceSettings) -> Self {
        Self {
            name: name.into(),
            source_type: kind.type_name().to_string(),
            enabled: true,
            config,
        }
    }

    /// Registry lookup of the type name
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::UnknownSourceType`] if the name is not registered
    pub fn kind(&self) -> Result<SourceKind> {
        SourceKind::from_type_name(&self.source_type)
            .ok_or_else(|| ProvenantError::UnknownSourceType(self.source_type.clone()))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    /// Sources in priority order
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    /// Glob patterns excluded from both snapshots
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Worker threads for comparison and resolution (CPU count if unset)
    #[serde(default, alias = "parallel_workers")]
    pub parallel_workers: Option<usize>,
    /// Abort when a source fails to initialize; otherwise skip it
    #[serde(default = "default_true", alias = "fail_on_source_error")]
    pub fail_on_source_error: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            exclude: Vec::new(),
            parallel_workers: None,
            fail_on_source_error: true,
        }
    }
}

impl AuditConfig {
    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::Configuration`] if the file cannot be read
    /// - [`ProvenantError::Json`] if it is not valid configuration JSON
    /// - [`ProvenantError::UnknownSourceType`] for unregistered source types
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvenantError::configuration(format!("cannot read {:?}: {}", path, e))
        })?;
        debug!("Loaded configuration from {:?}", path);
        Self::from_json(&content)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AuditConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check source types and names
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ProvenantError::configuration("source name must not be empty"));
            }
            source.kind()?;
            if !names.insert(source.name.as_str()) {
                warn!("Source name '{}' is used more than once", source.name);
            }
        }
        if self.parallel_workers == Some(0) {
            return Err(ProvenantError::configuration("parallelWorkers must be at least 1"));
        }
        Ok(())
    }

    /// Sources that will be constructed, in priority order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Effective worker count
    pub fn workers(&self) -> usize {
        self.parallel_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}
