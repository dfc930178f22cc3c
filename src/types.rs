//! Core data types used throughout the provenant library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Snapshot paths**: [`RelativePath`] - a root-relative path with `/` separators
//! - **Differences**: [`ChangeKind`], [`ChangeRecord`], [`Magnitude`], [`ChangeSummary`]
//! - **Attribution**: [`ProvenanceResult`] - the terminal answer for one changed file
//! - **Progress**: [`ProgressInfo`] - passed to progress callbacks during long passes
//!
//! ## Examples
//!
//! ```rust
//! use provenant::types::{RelativePath, ProvenanceResult};
//! use std::path::Path;
//!
//! let path = RelativePath::from_path(Path::new("wp-content/plugins/akismet/akismet.php"));
//! assert_eq!(path.strip_dir_prefix("wp-content/plugins"), Some("akismet/akismet.php"));
//! assert!(ProvenanceResult::unknown().is_unknown());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A snapshot path relative to its root, normalized to `/` separators
///
/// All matching logic (set differences, source scopes, archive lookups) works on
/// the platform-neutral key. The native relative path is kept alongside it so a
/// file whose name is not valid UTF-8 can still be opened. Use
/// [`RelativePath::to_native`] to get back to a filesystem location under a
/// particular root.
///
/// Bytes that are not valid UTF-8 are rendered as `\xNN` in the key. Ordering
/// and equality also consider the native form, so two names never fold into one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath {
    key: String,
    native: PathBuf,
}

impl RelativePath {
    /// Build from a relative filesystem path, joining normal components with `/`
    pub fn from_path(path: &Path) -> Self {
        let mut parts = Vec::new();
        let mut native = PathBuf::new();
        for component in path.components() {
            if let Component::Normal(part) = component {
                parts.push(escape_component(part));
                native.push(part);
            }
        }
        RelativePath {
            key: parts.join("/"),
            native,
        }
    }

    /// Build from a string that may use either separator
    pub fn new(path: impl AsRef<str>) -> Self {
        let parts: Vec<&str> = path
            .as_ref()
            .split(['/', '\\'])
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        RelativePath {
            key: parts.join("/"),
            native: parts.iter().collect(),
        }
    }

    /// The normalized string form
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Location of this path beneath `root`
    pub fn to_native(&self, root: &Path) -> PathBuf {
        root.join(&self.native)
    }

    /// Iterate over `/`-separated segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.key.split('/').filter(|s| !s.is_empty())
    }

    /// First path segment, if any
    pub fn first_segment(&self) -> Option<&str> {
        self.segments().next()
    }

    /// Strip a directory prefix on segment boundaries
    ///
    /// `"vendor"` strips `"vendor/x.php"` to `"x.php"` but does not match
    /// `"vendored/x.php"`. An empty prefix matches every path.
    pub fn strip_dir_prefix(&self, prefix: &str) -> Option<&str> {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Some(&self.key);
        }
        let rest = self.key.strip_prefix(prefix)?;
        rest.strip_prefix('/').filter(|r| !r.is_empty())
    }

    /// Native form of what [`strip_dir_prefix`](Self::strip_dir_prefix) leaves
    pub fn strip_native_prefix(&self, prefix: &str) -> Option<PathBuf> {
        self.strip_dir_prefix(prefix)?;
        let depth = prefix.split('/').filter(|s| !s.is_empty()).count();
        Some(self.native.components().skip(depth).collect())
    }
}

#[cfg(unix)]
fn escape_component(part: &std::ffi::OsStr) -> String {
    use std::fmt::Write;
    use std::os::unix::ffi::OsStrExt;

    let mut escaped = String::new();
    for chunk in part.as_bytes().utf8_chunks() {
        escaped.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(escaped, "\\x{:02x}", byte);
        }
    }
    escaped
}

#[cfg(not(unix))]
fn escape_component(part: &std::ffi::OsStr) -> String {
    part.to_string_lossy().into_owned()
}

impl Serialize for RelativePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key)
    }
}

impl<'de> Deserialize<'de> for RelativePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(RelativePath::new)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<&str> for RelativePath {
    fn from(value: &str) -> Self {
        RelativePath::new(value)
    }
}

/// Classification of a path that differs between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Present only in the new snapshot
    Added,
    /// Present only in the old snapshot
    Removed,
    /// Present in both with different bytes
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "Added"),
            ChangeKind::Removed => write!(f, "Removed"),
            ChangeKind::Modified => write!(f, "Modified"),
        }
    }
}

/// Size of a change, rendered as the report's "Changes" column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Magnitude {
    /// Number of lines in the unified diff between old and new content
    DiffLines(usize),
    /// At least one side could not be decoded as text
    Binary,
    /// No magnitude applies (removed files)
    None,
}

/// Marker emitted when content is not text
pub const BINARY_MARKER: &str = "Binary files differ";

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnitude::DiffLines(n) => write!(f, "{}", n),
            Magnitude::Binary => f.write_str(BINARY_MARKER),
            Magnitude::None => Ok(()),
        }
    }
}

/// One path that differs between the old and new snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Root-relative path
    pub path: RelativePath,
    /// How the path changed
    pub kind: ChangeKind,
    /// Diff size for added and modified files
    pub magnitude: Magnitude,
    /// Size in bytes on the side that still exists (old side for removed files)
    pub size: u64,
}

impl ChangeRecord {
    /// Text for the report's "Changes" column
    pub fn changes_label(&self) -> String {
        match self.kind {
            ChangeKind::Removed => "File Removed".to_string(),
            _ => self.magnitude.to_string(),
        }
    }
}

/// Attribution of a changed file to an origin
///
/// Results are terminal and immutable once produced. [`ProvenanceResult::unknown`]
/// is the sentinel for "no source matched".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceResult {
    /// Label of the matching origin, e.g. `Vendor Source`
    pub source_type: String,
    /// Origin detail such as a permalink
    pub info: String,
}

/// Source type reported when nothing matched
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Source type reported for removed files
pub const FILE_DELETED_SOURCE: &str = "File Deleted";

impl ProvenanceResult {
    /// Create a new result
    pub fn new(source_type: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            info: info.into(),
        }
    }

    /// The "no source matched" sentinel
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_SOURCE, "")
    }

    /// Fixed attribution for removed files
    pub fn file_deleted() -> Self {
        Self::new(FILE_DELETED_SOURCE, "")
    }

    /// Whether this is the unknown sentinel
    pub fn is_unknown(&self) -> bool {
        self.source_type == UNKNOWN_SOURCE && self.info.is_empty()
    }
}

/// Counts describing a snapshot comparison
///
/// # Examples
///
/// ```rust
/// # use provenant::types::ChangeSummary;
/// let summary = ChangeSummary {
///     files_added: 3,
///     files_removed: 1,
///     files_modified: 2,
///     files_unchanged: 10,
///     bytes_added: 300,
///     bytes_removed: 50,
/// };
///
/// assert_eq!(summary.total_changes(), 6);
/// assert_eq!(summary.net_size_change(), 250);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Number of added files
    pub files_added: usize,
    /// Number of removed files
    pub files_removed: usize,
    /// Number of modified files
    pub files_modified: usize,
    /// Number of files identical in both snapshots
    pub files_unchanged: usize,
    /// Total size of added files
    pub bytes_added: u64,
    /// Total size of removed files
    pub bytes_removed: u64,
}

impl ChangeSummary {
    /// Whether any path differs
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Number of change records
    pub fn total_changes(&self) -> usize {
        self.files_added + self.files_removed + self.files_modified
    }

    /// Bytes added minus bytes removed
    pub fn net_size_change(&self) -> i64 {
        self.bytes_added as i64 - self.bytes_removed as i64
    }
}

/// Progress callback for long-running operations
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Information passed to progress callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Items processed so far
    pub processed: usize,
    /// Total items to process (if known)
    pub total: Option<usize>,
}

impl ProgressInfo {
    /// Get progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.processed as f32 / total as f32) * 100.0),
            _ => None,
        }
    }
}
