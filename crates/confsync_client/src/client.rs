//! Client facade binding identity, sync engine, and cache store.

use crate::config::{ApiKey, ClientConfig};
use crate::engine::{SyncEngine, SyncStats, SyncStatus};
use crate::error::{ClientError, ClientResult};
use crate::identity::Identity;
use crate::transport::ConfigTransport;
use confsync_protocol::DeviceState;
use confsync_store::{CacheStore, DirStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The identity-bound client for one device against one service.
///
/// Composes the sync engine, the local cache store, and the lifecycle
/// reporting machinery behind a single object. Operations block until
/// complete and are meant to be issued one at a time; the store layer
/// guarantees readers never observe a half-committed configuration set
/// even so.
pub struct Client<T: ConfigTransport, S: CacheStore> {
    api_key: ApiKey,
    transport: Arc<T>,
    store: Arc<S>,
    engine: SyncEngine<T, S>,
    identity: Identity,
}

impl<T: ConfigTransport> Client<T, DirStore> {
    /// Opens a client over a durable cache rooted at the configured
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be prepared or is
    /// locked by another process.
    pub fn open(config: ClientConfig, transport: T) -> ClientResult<Self> {
        let store = DirStore::open(&config.cache_dir)?;
        Self::new(config, transport, store)
    }
}

impl<T: ConfigTransport, S: CacheStore> Client<T, S> {
    /// Creates a client from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the committed cache cannot be read.
    pub fn new(config: ClientConfig, transport: T, store: S) -> ClientResult<Self> {
        let transport = Arc::new(transport);
        let store = Arc::new(store);
        let engine = SyncEngine::new(
            config.api_key.clone(),
            Arc::clone(&transport),
            Arc::clone(&store),
        )?;

        Ok(Self {
            api_key: config.api_key,
            transport,
            store,
            engine,
            identity: Identity::default(),
        })
    }

    /// Binds the reporting identity. Must be called before
    /// [`update_state`](Self::update_state); calling again re-binds.
    pub fn identify(&self, client_name: impl Into<String>) {
        self.identity.identify(client_name);
    }

    /// Fetches the manifest and reports whether a download is needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Sync`] if the manifest fetch fails.
    pub fn check_latest(&self) -> ClientResult<bool> {
        self.engine.check_latest()
    }

    /// Result of the last manifest comparison, without network I/O.
    ///
    /// `false` until a check or download has happened.
    pub fn is_download_needed(&self) -> bool {
        self.engine.is_download_needed()
    }

    /// Downloads changed configuration bodies and atomically commits
    /// the new set. Returns whether a new state was committed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Sync`] or [`ClientError::Storage`]; the
    /// previously committed cache stays visible and a retry is safe.
    pub fn download_configurations(&self) -> ClientResult<bool> {
        self.engine.download_configurations()
    }

    /// Reads one configuration body from the committed cache.
    ///
    /// Falls back to alias matching when no primary name matches.
    /// `Ok(None)` when the committed set knows neither; an expected
    /// outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] only for I/O failures.
    pub fn get_configuration(&self, name: &str) -> ClientResult<Option<Vec<u8>>> {
        if let Some(body) = self.store.read_body(name)? {
            return Ok(Some(body));
        }
        match self.engine.resolve_name(name) {
            Some(primary) if primary != name => Ok(self.store.read_body(&primary)?),
            _ => Ok(None),
        }
    }

    /// Records a lifecycle state and reports it to the server.
    ///
    /// The local record always happens first; a delivery failure
    /// surfaces as [`ClientError::Report`] without rolling it back.
    /// The report carries the version of the currently committed
    /// manifest so the server knows which rollout it refers to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotIdentified`] before `identify`, or
    /// [`ClientError::Report`] when delivery fails.
    pub fn update_state(&self, state: DeviceState) -> ClientResult<()> {
        let report = self
            .identity
            .record(state, self.engine.committed_version())?;
        info!(state = %state, version = ?report.manifest_version, "reporting device state");

        self.transport
            .report_state(&self.api_key, &report)
            .map_err(|e| {
                warn!(error = %e, "state report delivery failed");
                match e {
                    ClientError::Report(_) => e,
                    other => ClientError::Report(other.to_string()),
                }
            })
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    /// Sync activity counters.
    pub fn stats(&self) -> SyncStats {
        self.engine.stats()
    }

    /// Version of the committed configuration set, if any.
    pub fn committed_version(&self) -> Option<u64> {
        self.engine.committed_version()
    }

    /// Age of the last successful manifest check.
    pub fn last_checked_age(&self) -> Option<Duration> {
        self.engine.last_checked_age()
    }

    /// The bound reporting identity, if any.
    pub fn client_name(&self) -> Option<String> {
        self.identity.client_name()
    }

    /// The most recently recorded lifecycle state, if any.
    pub fn current_state(&self) -> Option<DeviceState> {
        self.identity.current_state()
    }

    /// Manifest version of the most recent state record, if any.
    pub fn last_reported_version(&self) -> Option<u64> {
        self.identity.last_reported_version()
    }
}
