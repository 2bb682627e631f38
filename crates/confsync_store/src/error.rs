//! Error types for cache storage.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting or reading the cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the cache directory lock.
    #[error("cache directory locked: another process has exclusive access")]
    Locked,

    /// The committed cache contents are damaged.
    #[error("cache corrupted: {0}")]
    Corrupted(String),

    /// A state was assembled whose bodies do not match its manifest.
    #[error("inconsistent cached state: {0}")]
    InconsistentState(String),

    /// An entry name cannot be mapped to a cache file path.
    #[error("entry name not storable: {name:?}")]
    InvalidEntryName {
        /// The offending entry name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::Locked;
        assert!(err.to_string().contains("locked"));

        let err = StoreError::InvalidEntryName {
            name: "../escape".into(),
        };
        assert!(err.to_string().contains("../escape"));
    }
}
