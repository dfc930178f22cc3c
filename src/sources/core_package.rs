//! Remote core package
//!
//! Downloads one well-known release archive at construction and indexes it.
//! Any file in the new snapshot whose hash equals the indexed hash at
//! `archivePrefix + path` is attributed to the vendor.

use super::{ProvenanceSource, SourceEnvironment, SourceKind, SourceSettings, VENDOR_SOURCE_LABEL};
use crate::error::{ProvenantError, Result};
use crate::index::ReferenceIndex;
use crate::remote::Fetcher;
use crate::types::{ProvenanceResult, RelativePath};
use crate::utils;
use std::path::PathBuf;
use tracing::{info, warn};

/// Latest stable release archive
pub const DEFAULT_DOWNLOAD_URL: &str = "https://wordpress.org/latest.zip";

/// Top-level directory of entries in the release archive
pub const DEFAULT_ARCHIVE_PREFIX: &str = "wordpress/";

/// Canonical info link for matches
pub const DEFAULT_INFO: &str = "https://wordpress.org/";

/// Hash comparison against a single release archive
#[derive(Debug, Clone)]
pub struct CorePackageSource {
    name: String,
    base_path: PathBuf,
    archive_prefix: String,
    /// `None` when the archive was not found; every query is then a miss
    index: Option<ReferenceIndex>,
    result: ProvenanceResult,
}

impl CorePackageSource {
    /// Download and index `download_url`
    ///
    /// A definitive "not found" leaves the source with no index, so it never
    /// matches. Transport failures and unreadable archives are errors.
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::SourceInitialization`] if the download or indexing fails
    pub fn new(
        name: impl Into<String>,
        base_path: PathBuf,
        download_url: &str,
        archive_prefix: impl Into<String>,
        result: ProvenanceResult,
        fetcher: &dyn Fetcher,
    ) -> Result<Self> {
        let name = name.into();
        info!("Source '{}': fetching {}", name, download_url);

        let index = match fetcher.fetch(download_url) {
            Ok(Some(bytes)) => {
                let index = ReferenceIndex::from_zip_bytes(&bytes)
                    .map_err(|e| ProvenantError::source_init(&name, e))?;
                info!("Source '{}': indexed {} files", name, index.len());
                Some(index)
            }
            Ok(None) => {
                warn!("Source '{}': {} not found, no files will match", name, download_url);
                None
            }
            Err(e) => return Err(ProvenantError::source_init(&name, e)),
        };

        Ok(Self {
            name,
            base_path,
            archive_prefix: normalize_prefix(&archive_prefix.into()),
            index,
            result,
        })
    }

    /// Build from descriptor settings
    ///
    /// All settings are optional: `downloadUrl`, `archivePrefix`, `info`, `label`.
    pub fn from_settings(name: &str, settings: &SourceSettings, env: &SourceEnvironment) -> Result<Self> {
        let download_url = settings
            .get_str("downloadUrl")?
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_URL.to_string());
        let archive_prefix = settings
            .get_str("archivePrefix")?
            .unwrap_or_else(|| DEFAULT_ARCHIVE_PREFIX.to_string());
        let label = settings
            .get_str("label")?
            .unwrap_or_else(|| VENDOR_SOURCE_LABEL.to_string());
        let info = settings.get_str("info")?.unwrap_or_else(|| DEFAULT_INFO.to_string());

        Self::new(
            name,
            env.base_path.clone(),
            &download_url,
            archive_prefix,
            ProvenanceResult::new(label, info),
            env.fetcher.as_ref(),
        )
    }

    /// Number of indexed archive entries (0 if the archive was not found)
    pub fn indexed_files(&self) -> usize {
        self.index.as_ref().map_or(0, ReferenceIndex::len)
    }
}

/// `"wordpress"` and `"wordpress/"` both name the same archive directory
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

impl ProvenanceSource for CorePackageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CorePackage
    }

    fn resolve(&self, path: &RelativePath) -> Result<Option<ProvenanceResult>> {
        let Some(index) = &self.index else {
            return Ok(None);
        };
        let key = format!("{}{}", self.archive_prefix, path);
        let Some(expected) = index.get(&key) else {
            return Ok(None);
        };

        let actual = utils::hash_file(&path.to_native(&self.base_path))?;
        Ok((actual == expected).then(|| self.result.clone()))
    }
}
