//! Error types for the client.

use confsync_protocol::ProtocolError;
use confsync_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Phase of a sync cycle in which a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Fetching the manifest.
    Manifest,
    /// Fetching an entry body.
    Body,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Manifest => f.write_str("manifest"),
            SyncPhase::Body => f.write_str("body"),
        }
    }
}

/// Errors surfaced by client operations.
///
/// None of these are fatal to the process: every operation is safely
/// retryable, and a failed download never touches the committed cache.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server returned data that could not be interpreted.
    #[error("malformed manifest: {0}")]
    Malformed(#[from] ProtocolError),

    /// Local cache persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A network fetch failed during a sync cycle.
    #[error("{phase} fetch failed: {message}")]
    Sync {
        /// Which fetch phase failed.
        phase: SyncPhase,
        /// Entry name, when the failure was fetching a specific body.
        entry: Option<String>,
        /// Error message from the transport.
        message: String,
        /// Whether the fetch can be retried.
        retryable: bool,
    },

    /// A state report was attempted before `identify`.
    #[error("client identity not set; call identify first")]
    NotIdentified,

    /// The state report could not be delivered.
    ///
    /// The state was still recorded locally; reporting is best-effort.
    #[error("state report failed: {0}")]
    Report(String),
}

impl ClientError {
    /// Creates a retryable manifest-fetch error.
    pub fn sync_manifest(message: impl Into<String>) -> Self {
        Self::Sync {
            phase: SyncPhase::Manifest,
            entry: None,
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a retryable body-fetch error for one entry.
    pub fn sync_body(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sync {
            phase: SyncPhase::Body,
            entry: Some(entry.into()),
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable fetch error (e.g. the server revoked
    /// this device's access).
    pub fn sync_fatal(phase: SyncPhase, message: impl Into<String>) -> Self {
        Self::Sync {
            phase,
            entry: None,
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if retrying the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Sync { retryable, .. } => *retryable,
            ClientError::Report(_) => true,
            _ => false,
        }
    }
}
