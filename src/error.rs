//! Centralized error types for phishtriage.

use std::path::PathBuf;
use thiserror::Error;

use crate::mailbox::MailboxError;

/// All errors produced by the phishtriage library.
///
/// Only startup and scan-level failures live here. Problems with a single
/// message are recorded in the scan report instead of being returned.
#[derive(Error, Debug)]
pub enum TriageError {
    /// A model or vectorizer artifact is missing, corrupt or incompatible.
    #[error("Cannot load artifact '{path}': {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    /// The mailbox session could not be authenticated.
    #[error("Mailbox authentication failed: {0}")]
    Auth(#[source] MailboxError),

    /// The mailbox could not enumerate recent messages.
    #[error("Cannot list mailbox messages: {0}")]
    Listing(#[source] MailboxError),

    /// A scan was requested for zero messages.
    #[error("A scan needs at least one message, got {0}")]
    InvalidScanSize(usize),

    /// The configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `ArtifactLoad` variant from a path and any displayable reason.
    pub fn artifact(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts a whole scan (as opposed to startup).
    pub fn is_scan_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Listing(_) | Self::InvalidScanSize(_)
        )
    }
}
