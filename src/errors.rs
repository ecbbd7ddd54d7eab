//! Error types for the notesync application.
//!
//! This module defines custom error types that categorize different failures
//! that can occur during local persistence and remote synchronization.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure modes surfaced by a remote push attempt.
///
/// `AuthExpired` is global (the credential is bad for every note), the other
/// two are per-note and leave the note dirty for the next pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Remote rejected the credential; the user must re-authenticate.
    #[error("Notion rejected the access token; re-authentication required")]
    AuthExpired,

    /// Network failure, timeout, rate limit or 5xx. Transient, retry later.
    #[error("Notion is unreachable: {0}")]
    RemoteUnavailable(String),

    /// Remote schema rejected the payload. The note stays dirty and is
    /// retried on later passes in case the schema is fixed externally.
    #[error("Notion rejected the note payload: {0}")]
    ValidationRejected(String),
}

/// The main error type for the notesync application.
#[derive(Error, Debug)]
pub enum NsError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local persistence failed even after the quota-recovery retry.
    /// The mutation is dropped and logged; callers treat this as non-fatal.
    #[error("Failed to write note store at {path}: {message}")]
    StorageWriteFailure { path: PathBuf, message: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// No stored credential bundle; sync requires `login` first.
    #[error("Not authenticated with Notion")]
    NotAuthenticated,

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

impl NsError {
    /// Create a new application error from any displayable message
    pub fn app(message: impl Into<String>) -> Self {
        NsError::ApplicationError {
            message: message.into(),
        }
    }
}

impl RemoteError {
    /// Whether the failure invalidates every remaining push in a pass.
    pub fn is_global(&self) -> bool {
        matches!(self, RemoteError::AuthExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_expired_is_global() {
        assert!(RemoteError::AuthExpired.is_global());
        assert!(!RemoteError::RemoteUnavailable("503".into()).is_global());
        assert!(!RemoteError::ValidationRejected("bad select".into()).is_global());
    }

    #[test]
    fn remote_errors_carry_their_detail() {
        let err = RemoteError::RemoteUnavailable("request timed out".into());
        assert!(err.to_string().contains("request timed out"));
        assert!(RemoteError::ValidationRejected("bad select".into())
            .to_string()
            .contains("bad select"));
    }
}
