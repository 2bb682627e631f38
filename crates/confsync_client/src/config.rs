//! Client configuration.

use std::fmt;
use std::path::PathBuf;

/// Opaque API key identifying this device to the service.
///
/// Handed to the transport collaborator on every call; never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a raw key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key for a transport to place in a request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// Configuration for a confsync client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key for the configuration service.
    pub api_key: ApiKey,
    /// Root directory for the local configuration cache.
    pub cache_dir: PathBuf,
}

impl ClientConfig {
    /// Creates a client configuration.
    pub fn new(api_key: impl Into<ApiKey>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_construction() {
        let config = ClientConfig::new("key-123", "/var/lib/confsync")
            .with_cache_dir("/tmp/confsync");

        assert_eq!(config.api_key.expose(), "key-123");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/confsync"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret");
        let formatted = format!("{key:?}");
        assert!(!formatted.contains("super-secret"));
        assert_eq!(formatted, "ApiKey(..)");
    }
}
