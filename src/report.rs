//! CSV report output
//!
//! One row per changed path under the header `File,Changes,Source,Additional Info`.
//! Fields are quoted per RFC 4180 when they contain a comma, a quote, CR or LF,
//! and records end in CRLF. Rows are emitted in path order.

use crate::error::{ProvenantError, Result};
use crate::types::{ChangeKind, ChangeRecord, ProvenanceResult, RelativePath};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Report column headers
pub const HEADER: [&str; 4] = ["File", "Changes", "Source", "Additional Info"];

/// A changed path with its attribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    /// The change as found by the differ
    pub change: ChangeRecord,
    /// Attribution; always "File Deleted" for removed paths
    pub provenance: ProvenanceResult,
}

impl AuditRow {
    /// Pair a change with its attribution
    ///
    /// Removed paths are never resolved, so their attribution is fixed here.
    pub fn new(change: ChangeRecord, provenance: ProvenanceResult) -> Self {
        let provenance = if change.kind == ChangeKind::Removed {
            ProvenanceResult::file_deleted()
        } else {
            provenance
        };
        Self { change, provenance }
    }

    /// Row for a removed path
    pub fn removed(change: ChangeRecord) -> Self {
        Self::new(change, ProvenanceResult::file_deleted())
    }

    /// Root-relative path of the row
    pub fn path(&self) -> &RelativePath {
        &self.change.path
    }

    /// The four report fields, in column order
    pub fn fields(&self) -> [String; 4] {
        [
            self.change.path.to_string(),
            self.change.changes_label(),
            self.provenance.source_type.clone(),
            self.provenance.info.clone(),
        ]
    }
}

/// Render rows as CSV text, sorted by path
pub fn render_csv(rows: &[AuditRow]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_rows(&mut out, rows);
    String::from_utf8_lossy(&out).into_owned()
}

/// Write the report to `path`, replacing any existing file
pub fn write_csv(path: &Path, rows: &[AuditRow]) -> Result<()> {
    let report_error = |source| ProvenantError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(report_error)?;
    let mut writer = BufWriter::new(file);
    write_rows(&mut writer, rows).map_err(report_error)?;
    writer.flush().map_err(report_error)?;
    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

fn write_rows<W: Write>(writer: &mut W, rows: &[AuditRow]) -> std::io::Result<()> {
    write_record(writer, HEADER.iter().copied())?;

    let mut sorted: Vec<&AuditRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.path().cmp(b.path()));
    for row in sorted {
        let fields = row.fields();
        write_record(writer, fields.iter().map(String::as_str))?;
    }
    Ok(())
}

fn write_record<'a, W: Write>(writer: &mut W, fields: impl Iterator<Item = &'a str>) -> std::io::Result<()> {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(quote(field).as_bytes())?;
    }
    writer.write_all(b"\r\n")
}

fn quote(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}
