//! Remote named package
//!
//! Files under `relativePath/<identifier>/…` are checked against the release
//! archive of the package named by `<identifier>`. Archives are fetched lazily,
//! the first time an identifier is seen, and the outcome is cached for the
//! rest of the session:
//!
//! ```text
//! Uninitialized ──first query──> Fetching ──> Indexed | NotFound
//! ```
//!
//! Both terminal states are sticky. Each identifier owns a [`OnceLock`] cell in
//! a [`DashMap`], so concurrent queries for the same identifier wait on a
//! single fetch instead of issuing their own. A failed fetch (transport error
//! or unreadable archive) is logged and cached as NotFound.

use super::{normalize_subtree, ProvenanceSource, SourceEnvironment, SourceKind, SourceSettings, VENDOR_SOURCE_LABEL};
use crate::error::Result;
use crate::index::ReferenceIndex;
use crate::remote::Fetcher;
use crate::types::{ProvenanceResult, RelativePath};
use crate::utils;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Archive location; `{identifier}` is substituted
pub const DEFAULT_URL_TEMPLATE: &str = "https://downloads.wordpress.org/plugin/{identifier}.latest-stable.zip";

/// Info link for matches; `{identifier}` is substituted
pub const DEFAULT_INFO_TEMPLATE: &str = "https://wordpress.org/plugins/{identifier}/";

const IDENTIFIER_PLACEHOLDER: &str = "{identifier}";

type IndexCell = Arc<OnceLock<Option<Arc<ReferenceIndex>>>>;

/// Hash comparison against per-identifier package archives
pub struct NamedPackageSource {
    name: String,
    base_path: PathBuf,
    relative_path: String,
    url_template: String,
    info_template: String,
    label: String,
    fetcher: Arc<dyn Fetcher>,
    cache: DashMap<String, IndexCell>,
}

impl std::fmt::Debug for NamedPackageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedPackageSource")
            .field("name", &self.name)
            .field("relative_path", &self.relative_path)
            .field("url_template", &self.url_template)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl NamedPackageSource {
    /// Create a source for packages installed under `relative_path`
    pub fn new(
        name: impl Into<String>,
        base_path: PathBuf,
        relative_path: &str,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            base_path,
            relative_path: normalize_subtree(relative_path),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            info_template: DEFAULT_INFO_TEMPLATE.to_string(),
            label: VENDOR_SOURCE_LABEL.to_string(),
            fetcher,
            cache: DashMap::new(),
        }
    }

    /// Override the archive URL template
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    /// Override the info URL template
    pub fn with_info_template(mut self, template: impl Into<String>) -> Self {
        self.info_template = template.into();
        self
    }

    /// Override the result label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Build from descriptor settings
    ///
    /// Requires `relativePath`; `urlTemplate`, `infoTemplate` and `label` are optional.
    pub fn from_settings(name: &str, settings: &SourceSettings, env: &SourceEnvironment) -> Result<Self> {
        let relative_path = settings.require_str(name, "relativePath")?;
        let mut source = Self::new(name, env.base_path.clone(), &relative_path, env.fetcher.clone());
        if let Some(template) = settings.get_str("urlTemplate")? {
            source = source.with_url_template(template);
        }
        if let Some(template) = settings.get_str("infoTemplate")? {
            source = source.with_info_template(template);
        }
        if let Some(label) = settings.get_str("label")? {
            source = source.with_label(label);
        }
        Ok(source)
    }

    /// Identifiers whose fetch has completed, with whether an index was found
    pub fn cached_identifiers(&self) -> Vec<(String, bool)> {
        let mut out: Vec<(String, bool)> = self
            .cache
            .iter()
            .filter_map(|entry| entry.value().get().map(|index| (entry.key().clone(), index.is_some())))
            .collect();
        out.sort();
        out
    }

    fn index_for(&self, identifier: &str) -> Option<Arc<ReferenceIndex>> {
        let cell: IndexCell = self.cache.entry(identifier.to_string()).or_default().clone();
        cell.get_or_init(|| self.fetch_index(identifier)).clone()
    }

    fn fetch_index(&self, identifier: &str) -> Option<Arc<ReferenceIndex>> {
        let url = self.url_template.replace(IDENTIFIER_PLACEHOLDER, identifier);
        info!("Source '{}': fetching package {} from {}", self.name, identifier, url);

        let bytes = match self.fetcher.fetch(&url) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("Source '{}': package {} not found", self.name, identifier);
                return None;
            }
            Err(e) => {
                warn!("Source '{}': fetching {} failed: {}", self.name, url, e);
                return None;
            }
        };

        match ReferenceIndex::from_zip_bytes(&bytes) {
            Ok(index) => {
                debug!("Source '{}': indexed {} files for {}", self.name, index.len(), identifier);
                Some(Arc::new(index))
            }
            Err(e) => {
                warn!("Source '{}': archive for {} is unreadable: {}", self.name, identifier, e);
                None
            }
        }
    }
}

/// Package identifiers are URL path segments; anything else is never fetched
fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier.starts_with('.')
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl ProvenanceSource for NamedPackageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::NamedPackage
    }

    fn resolve(&self, path: &RelativePath) -> Result<Option<ProvenanceResult>> {
        let Some(rest) = path.strip_dir_prefix(&self.relative_path) else {
            return Ok(None);
        };
        // Files directly under the packages directory belong to no package
        let Some((identifier, _)) = rest.split_once('/') else {
            return Ok(None);
        };
        if !is_valid_identifier(identifier) {
            return Ok(None);
        }

        let Some(index) = self.index_for(identifier) else {
            return Ok(None);
        };
        let Some(expected) = index.get(rest) else {
            return Ok(None);
        };

        let actual = utils::hash_file(&path.to_native(&self.base_path))?;
        if actual != expected {
            return Ok(None);
        }
        let info = self.info_template.replace(IDENTIFIER_PLACEHOLDER, identifier);
        Ok(Some(ProvenanceResult::new(&self.label, info)))
    }
}
