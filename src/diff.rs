//! Line-level diff sizing for changed text files
//!
//! The magnitude of a change is the number of lines a unified diff with three
//! lines of context would print: the two file header lines, one `@@` header per
//! hunk, and every context, deleted and added line inside the hunks. Identical
//! content therefore measures `0`, and a one-line file diffed against empty
//! content measures `4`.
//!
//! ## Algorithm
//!
//! Common leading and trailing lines are trimmed first, then the Longest Common
//! Subsequence of the remaining middle is computed with dynamic programming.
//! When the middle is too large for the LCS table it is treated as a full
//! replacement, which over-approximates the diff rather than exhausting memory.
//!
//! Lines keep their terminators, so content differing only in a trailing newline
//! still produces a non-empty diff.
//!
//! ## Examples
//!
//! ```rust
//! use provenant::diff::magnitude;
//! use provenant::types::Magnitude;
//!
//! let m = magnitude(b"line1\nline2\n", b"line1\nline3\n");
//! assert_eq!(m, Magnitude::DiffLines(6));
//!
//! let m = magnitude(b"line1\n", b"\xff\xfe");
//! assert_eq!(m, Magnitude::Binary);
//! ```

use crate::types::Magnitude;

/// Context lines around each change, as in `diff -u`
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Upper bound on LCS table cells before falling back to full replacement
const MAX_LCS_CELLS: usize = 16 * 1024 * 1024;

/// Bytes inspected for NUL when deciding whether content is text
const BINARY_SNIFF_LEN: usize = 8192;

/// Options controlling diff sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Unchanged lines kept around each change
    pub context_lines: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// One line inside a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange<'a> {
    /// Unchanged line shown for context
    Context(&'a str),
    /// Line only in the old content
    Deleted(&'a str),
    /// Line only in the new content
    Added(&'a str),
}

/// A contiguous group of changes with surrounding context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk<'a> {
    /// Lines of the hunk in output order
    pub changes: Vec<LineChange<'a>>,
}

impl DiffHunk<'_> {
    /// Printed lines including the `@@` header
    pub fn printed_lines(&self) -> usize {
        1 + self.changes.len()
    }
}

/// Decode content as text, or `None` if it is binary
///
/// Content is binary when it contains a NUL byte in its first 8KB or is not
/// valid UTF-8.
pub fn decode_text(content: &[u8]) -> Option<&str> {
    let sniff = content.len().min(BINARY_SNIFF_LEN);
    if content[..sniff].contains(&0) {
        return None;
    }
    std::str::from_utf8(content).ok()
}

/// Magnitude of the change from `old` to `new` with default options
///
/// Returns [`Magnitude::Binary`] instead of failing when either side is not text.
pub fn magnitude(old: &[u8], new: &[u8]) -> Magnitude {
    magnitude_with(old, new, &DiffOptions::default())
}

/// Magnitude of the change from `old` to `new`
pub fn magnitude_with(old: &[u8], new: &[u8], options: &DiffOptions) -> Magnitude {
    match (decode_text(old), decode_text(new)) {
        (Some(old_text), Some(new_text)) => {
            let hunks = compute_hunks(old_text, new_text, options);
            Magnitude::DiffLines(unified_line_count(&hunks))
        }
        _ => Magnitude::Binary,
    }
}

/// Lines a unified diff of these hunks prints, headers included
pub fn unified_line_count(hunks: &[DiffHunk<'_>]) -> usize {
    if hunks.is_empty() {
        return 0;
    }
    2 + hunks.iter().map(DiffHunk::printed_lines).sum::<usize>()
}

/// Compute unified-diff hunks between two texts
pub fn compute_hunks<'a>(old_text: &'a str, new_text: &'a str, options: &DiffOptions) -> Vec<DiffHunk<'a>> {
    let old_lines: Vec<&str> = old_text.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new_text.split_inclusive('\n').collect();

    if old_lines == new_lines {
        return vec![];
    }

    let changes = compute_changes(&old_lines, &new_lines);
    create_hunks(&changes, &old_lines, &new_lines, options.context_lines)
}

/// Represents a change operation in the diff
#[derive(Debug, Clone, Copy)]
enum ChangeOp {
    Keep(usize),   // old_line_idx
    Delete(usize), // old_line_idx
    Insert(usize), // new_line_idx
}

/// Compute the sequence of change operations
fn compute_changes(old_lines: &[&str], new_lines: &[&str]) -> Vec<ChangeOp> {
    let prefix = old_lines
        .iter()
        .zip(new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_lines[prefix..]
        .iter()
        .rev()
        .zip(new_lines[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old_lines[prefix..old_lines.len() - suffix];
    let new_mid = &new_lines[prefix..new_lines.len() - suffix];

    let mut changes: Vec<ChangeOp> = (0..prefix).map(ChangeOp::Keep).collect();

    if old_mid.is_empty() || new_mid.is_empty() || old_mid.len() * new_mid.len() > MAX_LCS_CELLS {
        changes.extend((0..old_mid.len()).map(|i| ChangeOp::Delete(prefix + i)));
        changes.extend((0..new_mid.len()).map(|i| ChangeOp::Insert(prefix + i)));
    } else {
        let lcs = compute_lcs(old_mid, new_mid);
        changes.extend(lcs_to_changes(&lcs, old_mid.len(), new_mid.len(), prefix));
    }

    let old_suffix_start = old_lines.len() - suffix;
    changes.extend((0..suffix).map(|i| ChangeOp::Keep(old_suffix_start + i)));
    changes
}

/// Compute longest common subsequence using dynamic programming
fn compute_lcs(old_lines: &[&str], new_lines: &[&str]) -> Vec<(usize, usize)> {
    let m = old_lines.len();
    let n = new_lines.len();
    let width = n + 1;

    // Flat table of (m+1) x (n+1)
    let mut dp = vec![0u32; (m + 1) * width];

    for i in 1..=m {
        for j in 1..=n {
            dp[i * width + j] = if old_lines[i - 1] == new_lines[j - 1] {
                dp[(i - 1) * width + (j - 1)] + 1
            } else {
                dp[(i - 1) * width + j].max(dp[i * width + (j - 1)])
            };
        }
    }

    // Backtrack to find LCS
    let mut lcs = Vec::new();
    let mut i = m;
    let mut j = n;

    while i > 0 && j > 0 {
        if old_lines[i - 1] == new_lines[j - 1] {
            lcs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[(i - 1) * width + j] > dp[i * width + (j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    lcs.reverse();
    lcs
}

/// Convert LCS of the trimmed middle into change operations on full-file indices
fn lcs_to_changes(lcs: &[(usize, usize)], old_len: usize, new_len: usize, offset: usize) -> Vec<ChangeOp> {
    let mut changes = Vec::with_capacity(old_len + new_len);
    let mut old_idx = 0;
    let mut new_idx = 0;

    for &(lcs_old, lcs_new) in lcs {
        while old_idx < lcs_old {
            changes.push(ChangeOp::Delete(offset + old_idx));
            old_idx += 1;
        }
        while new_idx < lcs_new {
            changes.push(ChangeOp::Insert(offset + new_idx));
            new_idx += 1;
        }
        changes.push(ChangeOp::Keep(offset + old_idx));
        old_idx += 1;
        new_idx += 1;
    }

    while old_idx < old_len {
        changes.push(ChangeOp::Delete(offset + old_idx));
        old_idx += 1;
    }
    while new_idx < new_len {
        changes.push(ChangeOp::Insert(offset + new_idx));
        new_idx += 1;
    }

    changes
}

/// Create diff hunks from change operations
///
/// A kept line joins a hunk when a change lies within `context_lines` operations
/// of it, so two changes separated by at most `2 * context_lines` kept lines end
/// up in the same hunk.
fn create_hunks<'a>(
    changes: &[ChangeOp],
    old_lines: &[&'a str],
    new_lines: &[&'a str],
    context_lines: usize,
) -> Vec<DiffHunk<'a>> {
    let mut hunks = Vec::new();
    let mut current: Option<DiffHunk<'a>> = None;

    for (i, change) in changes.iter().enumerate() {
        let line = match *change {
            ChangeOp::Keep(old_idx) => {
                if !is_near_change(changes, i, context_lines) {
                    if let Some(hunk) = current.take() {
                        hunks.push(hunk);
                    }
                    continue;
                }
                LineChange::Context(old_lines[old_idx])
            }
            ChangeOp::Delete(old_idx) => LineChange::Deleted(old_lines[old_idx]),
            ChangeOp::Insert(new_idx) => LineChange::Added(new_lines[new_idx]),
        };

        current
            .get_or_insert_with(|| DiffHunk { changes: Vec::new() })
            .changes
            .push(line);
    }

    if let Some(hunk) = current {
        hunks.push(hunk);
    }

    hunks
}

/// Check if a position is near a change (within context_lines)
fn is_near_change(changes: &[ChangeOp], pos: usize, context_lines: usize) -> bool {
    let start = pos.saturating_sub(context_lines);
    let end = (pos + context_lines + 1).min(changes.len());

    changes[start..end]
        .iter()
        .any(|c| matches!(c, ChangeOp::Delete(_) | ChangeOp::Insert(_)))
}
