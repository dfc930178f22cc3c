//! Local reference mirror
//!
//! Claims files under `relativePath` whose counterpart in a local reference
//! directory is byte-identical. The result carries a fixed, configured label
//! and info string.

use super::{normalize_subtree, ProvenanceSource, SourceEnvironment, SourceKind, SourceSettings};
use crate::error::{ProvenantError, Result};
use crate::types::{ProvenanceResult, RelativePath};
use crate::utils;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Byte comparison against a local reference tree
#[derive(Debug, Clone)]
pub struct LocalMirrorSource {
    name: String,
    base_path: PathBuf,
    relative_path: String,
    reference_path: PathBuf,
    result: ProvenanceResult,
}

impl LocalMirrorSource {
    /// Create a mirror source
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::SourceInitialization`] if `reference_path` is not a directory
    pub fn new(
        name: impl Into<String>,
        base_path: PathBuf,
        relative_path: &str,
        reference_path: PathBuf,
        result: ProvenanceResult,
    ) -> Result<Self> {
        let name = name.into();
        if !reference_path.is_dir() {
            return Err(ProvenantError::source_init(
                &name,
                format!("reference directory {:?} does not exist", reference_path),
            ));
        }
        debug!("Mirror '{}' compares {:?} against {:?}", name, relative_path, reference_path);
        Ok(Self {
            name,
            base_path,
            relative_path: normalize_subtree(relative_path),
            reference_path,
            result,
        })
    }

    /// Build from descriptor settings
    ///
    /// Requires `relativePath`, `referencePath`, `sourceType` and `sourceAdditional`.
    pub fn from_settings(name: &str, settings: &SourceSettings, env: &SourceEnvironment) -> Result<Self> {
        let relative_path = settings.require_str(name, "relativePath")?;
        let reference_path = settings.require_str(name, "referencePath")?;
        let source_type = settings.require_str(name, "sourceType")?;
        let source_additional = settings.require_str(name, "sourceAdditional")?;
        Self::new(
            name,
            env.base_path.clone(),
            &relative_path,
            PathBuf::from(reference_path),
            ProvenanceResult::new(source_type, source_additional),
        )
    }
}

impl ProvenanceSource for LocalMirrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::LocalMirror
    }

    fn resolve(&self, path: &RelativePath) -> Result<Option<ProvenanceResult>> {
        let Some(rest) = path.strip_native_prefix(&self.relative_path) else {
            return Ok(None);
        };

        let reference = self.reference_path.join(rest);
        if !reference.is_file() {
            trace!("No reference copy of {}", path);
            return Ok(None);
        }

        let on_disk = path.to_native(&self.base_path);
        if utils::files_identical(&on_disk, &reference)? {
            Ok(Some(self.result.clone()))
        } else {
            Ok(None)
        }
    }
}
