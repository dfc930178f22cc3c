//! Reference index over a release archive
//!
//! A [`ReferenceIndex`] maps every file entry of a ZIP archive, by its
//! archive-relative path, to the content hash of that entry. Lookups are O(1);
//! the index is built once per artifact and then only read.

use crate::error::Result;
use crate::utils::{self, ContentHash};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::time::Instant;
use tracing::{debug, trace};

/// Archive-relative path to content hash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    entries: HashMap<String, ContentHash>,
}

impl ReferenceIndex {
    /// Index a ZIP archive held in memory
    ///
    /// # Errors
    ///
    /// - [`ProvenantError::Archive`] if the bytes are not a readable ZIP archive
    ///
    /// [`ProvenantError::Archive`]: crate::error::ProvenantError::Archive
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_zip_reader(Cursor::new(bytes))
    }

    /// Index a ZIP archive from any seekable reader
    pub fn from_zip_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let start = Instant::now();
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().replace('\\', "/");
            let hash = utils::hash_reader(&mut file)?;
            trace!("Indexed {} -> {}", name, hash);
            entries.insert(name, hash);
        }

        debug!("Indexed {} archive entries in {:?}", entries.len(), start.elapsed());
        Ok(Self { entries })
    }

    /// Insert an entry directly
    pub fn insert(&mut self, path: impl Into<String>, hash: ContentHash) {
        self.entries.insert(path.into(), hash);
    }

    /// Hash recorded for `path`
    pub fn get(&self, path: &str) -> Option<ContentHash> {
        self.entries.get(path).copied()
    }

    /// Number of indexed files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive contained no files
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
