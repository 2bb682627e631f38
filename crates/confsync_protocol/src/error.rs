//! Error types for manifest and report data.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors arising from server-provided data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The manifest payload could not be parsed or is missing fields.
    #[error("malformed manifest: {0}")]
    Malformed(String),

    /// Two entries in one manifest share a name.
    #[error("duplicate entry name in manifest: {name:?}")]
    DuplicateEntry {
        /// The conflicting entry name.
        name: String,
    },
}

impl ProtocolError {
    /// Creates a `Malformed` error from any displayable cause.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::malformed("unexpected end of input");
        assert_eq!(err.to_string(), "malformed manifest: unexpected end of input");

        let err = ProtocolError::DuplicateEntry {
            name: "a.json".into(),
        };
        assert!(err.to_string().contains("a.json"));
    }
}
