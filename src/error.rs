//! Error types for the provenant library
//!
//! This module defines all error types that can occur while comparing snapshots
//! and resolving provenance. Errors carry enough context to tell the user which
//! path or which configured source triggered them.
//!
//! Only fatal conditions are represented here. A reference archive that cannot be
//! found, or content that cannot be decoded as text, are ordinary outcomes and
//! never surface as a [`ProvenantError`].

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the provenant library
pub type Result<T> = std::result::Result<T, ProvenantError>;

/// Main error type for all provenant operations
#[derive(Debug, Error)]
pub enum ProvenantError {
    /// I/O errors that are not tied to a specific snapshot path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A listed file vanished or became unreadable before comparison finished
    #[error("Failed to read {path:?}: {source}")]
    FileRead {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The report could not be written after the audit finished
    #[error("Failed to write report {path:?}: {source}")]
    ReportWrite {
        /// Report destination
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A provenance source could not complete its eager setup
    #[error("Source '{source_name}' failed to initialize: {reason}")]
    SourceInitialization {
        /// Configured name of the source
        source_name: String,
        /// What went wrong
        reason: String,
    },

    /// Missing or malformed configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Source type name not present in the registry
    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),

    /// Exclude pattern could not be compiled
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Archive could not be opened or read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Version-control client failure
    #[error("VCS error: {0}")]
    Vcs(String),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ProvenantError {
    fn from(err: reqwest::Error) -> Self {
        ProvenantError::Http(err.to_string())
    }
}

impl From<zip::result::ZipError> for ProvenantError {
    fn from(err: zip::result::ZipError) -> Self {
        ProvenantError::Archive(err.to_string())
    }
}

impl ProvenantError {
    /// Create a configuration error with a custom message
    pub fn configuration(msg: impl Into<String>) -> Self {
        ProvenantError::Configuration(msg.into())
    }

    /// Create a VCS error with a custom message
    pub fn vcs(msg: impl Into<String>) -> Self {
        ProvenantError::Vcs(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ProvenantError::Internal(msg.into())
    }

    /// Wrap an I/O error with the snapshot path it occurred on
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvenantError::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a source initialization error
    pub fn source_init(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ProvenantError::SourceInitialization {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error was raised while building sources, before any file was processed
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            ProvenantError::SourceInitialization { .. }
                | ProvenantError::Configuration(_)
                | ProvenantError::UnknownSourceType(_)
                | ProvenantError::InvalidPattern(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            ProvenantError::FileRead { path, source } => {
                format!(
                    "Could not read {:?} ({}). The snapshot changed while it was being compared; \
                     re-run against a quiescent tree.",
                    path, source
                )
            }
            ProvenantError::SourceInitialization { source_name, reason } => {
                format!(
                    "Source '{}' could not be prepared: {}. Check connectivity or disable the source \
                     with \"enabled\": false.",
                    source_name, reason
                )
            }
            ProvenantError::UnknownSourceType(name) => {
                format!(
                    "Unknown source type '{}'. Known types: local_mirror, git_mirror, core_package, named_package.",
                    name
                )
            }
            _ => self.to_string(),
        }
    }
}
