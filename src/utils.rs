//! Content hashing and comparison helpers
//!
//! Every content hash in the crate is produced by the one private hasher behind
//! [`hash_reader`], [`hash_bytes`] and [`hash_file`]. Reference indexes built from
//! archives and on-disk files hashed at query time therefore share algorithm and
//! seed, so a path can only match on content.
//!
//! ## Example Usage
//!
//! ```rust
//! use provenant::utils::{hash_bytes, hash_reader};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let data = b"<?php echo 'hello';";
//! let from_slice = hash_bytes(data);
//! let from_reader = hash_reader(&mut &data[..])?;
//! assert_eq!(from_slice, from_reader);
//! # Ok(())
//! # }
//! ```

use crate::error::{ProvenantError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::hash::Hasher;
use std::io::Read;
use std::path::Path;
use twox_hash::XxHash64;

/// Chunk size for streaming reads
const BUFFER_SIZE: usize = 8192;

/// Seed for the content hash. Changing it invalidates nothing persistent but
/// must stay identical for index-build and query paths within a process.
const CONTENT_HASH_SEED: u64 = 0;

/// Fast non-cryptographic digest of file content (XXH64)
///
/// Used only for equality checks between on-disk content and indexed
/// reference content. It is not tamper-evident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(u64);

impl ContentHash {
    /// Raw 64-bit digest
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

/// The one hasher behind every [`ContentHash`]
struct ContentHasher(XxHash64);

impl ContentHasher {
    fn new() -> Self {
        ContentHasher(XxHash64::with_seed(CONTENT_HASH_SEED))
    }

    fn update(&mut self, chunk: &[u8]) {
        self.0.write(chunk);
    }

    fn finish(self) -> ContentHash {
        ContentHash(self.0.finish())
    }
}

/// Hash everything a reader yields
///
/// Uses an 8KB buffer so large files and archive entries are digested without
/// being held in memory.
pub fn hash_reader<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<ContentHash> {
    let mut hasher = ContentHasher::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish())
}

/// Hash an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finish()
}

/// Hash a file's content
///
/// # Errors
///
/// - [`ProvenantError::FileRead`] if the file cannot be opened or read
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let mut file = File::open(path).map_err(|e| ProvenantError::file_read(path, e))?;
    hash_reader(&mut file).map_err(|e| ProvenantError::file_read(path, e))
}

/// Byte-for-byte equality of two files
///
/// Sizes are compared first; equal sizes are then compared chunk by chunk.
/// Metadata such as timestamps and permissions is never consulted.
///
/// # Errors
///
/// - [`ProvenantError::FileRead`] naming whichever side could not be read
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let meta_a = std::fs::metadata(a).map_err(|e| ProvenantError::file_read(a, e))?;
    let meta_b = std::fs::metadata(b).map_err(|e| ProvenantError::file_read(b, e))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut file_a = File::open(a).map_err(|e| ProvenantError::file_read(a, e))?;
    let mut file_b = File::open(b).map_err(|e| ProvenantError::file_read(b, e))?;
    let mut buf_a = [0u8; BUFFER_SIZE];
    let mut buf_b = [0u8; BUFFER_SIZE];

    loop {
        let read_a = read_full(&mut file_a, &mut buf_a).map_err(|e| ProvenantError::file_read(a, e))?;
        let read_b = read_full(&mut file_b, &mut buf_b).map_err(|e| ProvenantError::file_read(b, e))?;
        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// Compare a file on disk against an in-memory buffer
pub fn file_matches_bytes(path: &Path, expected: &[u8]) -> Result<bool> {
    let meta = std::fs::metadata(path).map_err(|e| ProvenantError::file_read(path, e))?;
    if meta.len() != expected.len() as u64 {
        return Ok(false);
    }
    let actual = std::fs::read(path).map_err(|e| ProvenantError::file_read(path, e))?;
    Ok(actual == expected)
}

/// Fill `buf` as far as the reader allows, returning bytes read (0 at EOF)
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Format bytes in human-readable form
///
/// ```rust
/// use provenant::utils::format_bytes;
///
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
