//! Provenance resolution chain
//!
//! [`ProvenanceResolver`] holds already-initialized sources in priority order
//! and asks each in turn about a path; the first match wins and an exhausted
//! chain yields [`ProvenanceResult::unknown`]. No scoring or merging happens.
//!
//! Sources are read-only after construction, so one resolver may be shared
//! across threads.

use crate::config::SourceDescriptor;
use crate::error::{ProvenantError, Result};
use crate::sources::{ProvenanceSource, SourceEnvironment};
use crate::types::{ProvenanceResult, RelativePath};
use std::time::Instant;
use tracing::{debug, error, info, trace};

/// Ordered first-match-wins source chain
pub struct ProvenanceResolver {
    sources: Vec<Box<dyn ProvenanceSource>>,
}

impl std::fmt::Debug for ProvenanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceResolver")
            .field("sources", &self.source_names())
            .finish()
    }
}

impl ProvenanceResolver {
    /// Resolver over already-initialized sources
    pub fn new(sources: Vec<Box<dyn ProvenanceSource>>) -> Self {
        Self { sources }
    }

    /// Construct every enabled source eagerly, in order
    ///
    /// With `fail_on_source_error` the first initialization failure aborts;
    /// otherwise the failed source is logged and left out of the chain.
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::UnknownSourceType`] for an unregistered type
    /// - [`ProvenantError::Configuration`] for missing required settings
    /// - [`ProvenantError::SourceInitialization`] if a fetch or clone fails
    ///   and `fail_on_source_error` is set
    pub fn from_descriptors<'a>(
        descriptors: impl IntoIterator<Item = &'a SourceDescriptor>,
        env: &SourceEnvironment,
        fail_on_source_error: bool,
    ) -> Result<Self> {
        let mut sources = Vec::new();
        for descriptor in descriptors {
            if !descriptor.enabled {
                debug!("Skipping disabled source: {}", descriptor.name);
                continue;
            }
            let kind = descriptor.kind()?;
            info!("Loading source: {} ({})", descriptor.name, kind);
            let start = Instant::now();

            match kind.build(&descriptor.name, &descriptor.config, env) {
                Ok(source) => {
                    info!("Loaded source {} in {:?}", descriptor.name, start.elapsed());
                    sources.push(source);
                }
                Err(e @ ProvenantError::SourceInitialization { .. }) if !fail_on_source_error => {
                    error!("{}; continuing without it", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self { sources })
    }

    /// Attribute `path` to the first matching source, or Unknown
    ///
    /// # Errors
    ///
    /// Propagates the first source error (typically an unreadable on-disk
    /// file) instead of treating it as "no match".
    pub fn resolve(&self, path: &RelativePath) -> Result<ProvenanceResult> {
        for source in &self.sources {
            if let Some(result) = source.resolve(path)? {
                trace!("{} resolved by {}", path, source.name());
                return Ok(result);
            }
        }
        Ok(ProvenanceResult::unknown())
    }

    /// Names of the sources in priority order
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Number of sources in the chain
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the chain is empty (every path resolves to Unknown)
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
