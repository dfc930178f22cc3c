//! # Provenant - Where did this file come from?
//!
//! A forensic audit library for deployed software trees. Given a trusted
//! baseline snapshot and a live snapshot of the same tree, it reports every file
//! that was added, removed or modified and tries to attribute each added or
//! modified file to a known origin.
//!
//! ## Overview
//!
//! An audit has two passes:
//! - **Differencing**: both trees are listed and every path is classified as
//!   Added, Removed, Modified or Unchanged. Modification is decided on content,
//!   never on timestamps.
//! - **Provenance resolution**: each added or modified path is offered to an
//!   ordered chain of provenance sources. The first source that recognizes the
//!   exact content wins; otherwise the file is reported as `Unknown`.
//!
//! Files nobody can account for are the ones worth a human look.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use provenant::{AuditBuilder, AuditConfig};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuditConfig::from_json(r#"{
//!     "sources": [
//!         {"name": "Core", "type": "core_package", "config": {}},
//!         {"name": "Plugins", "type": "named_package",
//!          "config": {"relativePath": "wp-content/plugins"}}
//!     ]
//! }"#)?;
//!
//! let audit = AuditBuilder::new()
//!     .config(config)
//!     .build(PathBuf::from("./live"))?;
//! let report = audit.run(Path::new("./baseline"))?;
//!
//! for row in report.unattributed() {
//!     println!("{} ({})", row.path(), row.change.changes_label());
//! }
//! report.write_csv(Path::new("report.csv"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Provenance Sources
//!
//! | Type            | Matches when                                                       |
//! |-----------------|--------------------------------------------------------------------|
//! | `core_package`  | the file hashes equal to the same path in a release archive        |
//! | `named_package` | the file hashes equal to its entry in the archive of its package   |
//! | `git_mirror`    | some historical commit of a repository holds identical content     |
//! | `local_mirror`  | a local reference tree holds an identical copy                     |
//!
//! Sources are constructed eagerly when the audit is built, so an unreachable
//! archive or repository fails the run up front. Named packages are the
//! exception: each package archive is fetched the first time one of its files
//! is queried, once per run, and a missing package is remembered as missing.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ProvenantError>`. Resolution of a single
//! path is tri-state (`Ok(Some)` match, `Ok(None)` no match, `Err` failure), so
//! a file that cannot be read is never silently reported as `Unknown`.
//!
//! ## Module Organization
//!
//! - [`snapshot`]: listing a tree into a [`Snapshot`]
//! - [`compare`]: classifying paths into [`ChangeRecord`]s
//! - [`diff`]: unified-diff magnitude of a modification
//! - [`sources`]: the [`ProvenanceSource`] trait and its variants
//! - [`resolver`]: the first-match-wins source chain
//! - [`audit`]: orchestration of a full run
//! - [`report`]: CSV output
//! - [`config`]: JSON configuration
//! - [`remote`], [`vcs`], [`index`]: narrow capabilities used by sources

pub mod audit;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod index;
pub mod remote;
pub mod report;
pub mod resolver;
pub mod snapshot;
pub mod sources;
pub mod types;
pub mod utils;
pub mod vcs;

pub use audit::{Audit, AuditBuilder, AuditReport};
pub use compare::{Comparison, SnapshotDiffer};
pub use config::{AuditConfig, SourceDescriptor};
pub use error::{ProvenantError, Result};
pub use report::AuditRow;
pub use resolver::ProvenanceResolver;
pub use snapshot::{Snapshot, SnapshotWalker};
pub use sources::{ProvenanceSource, SourceKind, SourceSettings};
pub use types::*;
