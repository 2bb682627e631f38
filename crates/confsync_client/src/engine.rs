//! Sync engine: manifest checks and all-or-nothing downloads.

use crate::config::ApiKey;
use crate::error::{ClientError, ClientResult};
use crate::plan::SyncPlan;
use crate::transport::ConfigTransport;
use confsync_protocol::Manifest;
use confsync_store::{CacheStore, CachedState, StoreError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the engine stands relative to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No manifest check has happened yet.
    Unknown,
    /// A manifest was fetched; a download may be pending.
    ManifestFetched,
    /// The committed cache matches the last fetched manifest.
    Current,
    /// The last manifest fetch failed.
    ManifestFetchFailed,
    /// The last download cycle failed.
    DownloadFailed,
}

/// Counters describing the engine's activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Manifest checks performed.
    pub checks: u64,
    /// Download cycles that committed a new state.
    pub downloads_applied: u64,
    /// Bodies fetched over the network.
    pub bodies_fetched: u64,
    /// Bodies carried over from a previous state.
    pub bodies_carried: u64,
    /// When the last successful manifest fetch happened.
    pub last_check: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Orchestrates manifest fetch, comparison, body download, and the
/// atomic cache commit.
///
/// The engine never advances its notion of the synced version unless
/// the store reports a successful commit, and a commit only happens
/// once every body for the new manifest is in hand.
pub struct SyncEngine<T: ConfigTransport, S: CacheStore> {
    api_key: ApiKey,
    transport: Arc<T>,
    store: Arc<S>,
    /// In-memory copy of the committed manifest, seeded from the store.
    committed: RwLock<Option<Manifest>>,
    /// Manifest + plan from the last check, consumed by the next download.
    pending: RwLock<Option<(Manifest, SyncPlan)>>,
    status: RwLock<SyncStatus>,
    stats: RwLock<SyncStats>,
}

impl<T: ConfigTransport, S: CacheStore> SyncEngine<T, S> {
    /// Creates an engine over a transport and a cache store.
    ///
    /// Loads the committed state once to seed the in-memory manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(api_key: ApiKey, transport: Arc<T>, store: Arc<S>) -> ClientResult<Self> {
        let committed = store.load()?.map(|state| state.manifest().clone());
        match &committed {
            Some(manifest) => {
                info!(version = manifest.version(), "loaded cached configuration set");
            }
            None => info!("no cached configuration set found"),
        }

        Ok(Self {
            api_key,
            transport,
            store,
            committed: RwLock::new(committed),
            pending: RwLock::new(None),
            status: RwLock::new(SyncStatus::Unknown),
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Current engine status.
    pub fn status(&self) -> SyncStatus {
        *self.status.read()
    }

    /// Activity counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Version of the committed configuration set, if any.
    pub fn committed_version(&self) -> Option<u64> {
        self.committed.read().as_ref().map(Manifest::version)
    }

    /// Age of the last successful manifest check.
    pub fn last_checked_age(&self) -> Option<Duration> {
        self.stats.read().last_check.map(|at| at.elapsed())
    }

    /// Fetches the manifest and reports whether a download is needed.
    ///
    /// Only the manifest travels over the network; the committed cache
    /// is left untouched. Safe to call repeatedly; each call re-fetches
    /// and re-compares.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Sync`] if the manifest fetch fails.
    pub fn check_latest(&self) -> ClientResult<bool> {
        debug!("checking for latest configuration data");
        let fetched = match self.transport.fetch_manifest(&self.api_key) {
            Ok(manifest) => manifest,
            Err(e) => {
                self.fail(SyncStatus::ManifestFetchFailed, &e);
                return Err(e);
            }
        };

        let plan = SyncPlan::compute(&fetched, self.committed.read().as_ref());
        let needs_update = plan.needs_update;

        {
            let mut stats = self.stats.write();
            stats.checks += 1;
            stats.last_check = Some(Instant::now());
            stats.last_error = None;
        }
        *self.status.write() = if needs_update {
            SyncStatus::ManifestFetched
        } else {
            SyncStatus::Current
        };
        info!(version = fetched.version(), needs_update, "manifest checked");
        *self.pending.write() = Some((fetched, plan));

        Ok(needs_update)
    }

    /// Result of the last comparison, without network I/O.
    ///
    /// Returns `false` until `check_latest` or
    /// `download_configurations` has produced a comparison, and again
    /// after a download brings the cache up to date.
    pub fn is_download_needed(&self) -> bool {
        self.pending
            .read()
            .as_ref()
            .is_some_and(|(_, plan)| plan.needs_update)
    }

    /// Downloads changed bodies and atomically commits the new set.
    ///
    /// Reuses the manifest from a prior `check_latest` when one is
    /// pending, otherwise fetches it first. Bodies whose content
    /// revision is unchanged are carried over from the committed state
    /// instead of re-fetched. The store commit happens only after every
    /// body for the new manifest is in hand; any fetch failure aborts
    /// the cycle with the previous cache untouched.
    ///
    /// Returns whether a new state was committed (`false` when already
    /// up to date).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Sync`] on fetch failure and
    /// [`ClientError::Storage`] on commit failure; both leave the
    /// previously committed state visible and are safe to retry.
    pub fn download_configurations(&self) -> ClientResult<bool> {
        let pending = self.pending.read().clone();
        let (manifest, plan) = match pending {
            Some(pending) => pending,
            None => {
                let needs_update = self.check_latest()?;
                debug!(needs_update, "manifest fetched for download cycle");
                match self.pending.read().clone() {
                    Some(pending) => pending,
                    // check_latest always leaves a pending manifest behind
                    None => return Ok(false),
                }
            }
        };

        if !plan.needs_update {
            debug!("configurations already up to date");
            *self.status.write() = SyncStatus::Current;
            return Ok(false);
        }

        let mut bodies = BTreeMap::new();
        for name in &plan.carry_over {
            match self.store.read_body(name) {
                Ok(Some(body)) => {
                    bodies.insert(name.clone(), body);
                }
                Ok(None) => {
                    let e = ClientError::Storage(StoreError::Corrupted(format!(
                        "carry-over body {name:?} missing from committed cache"
                    )));
                    self.fail(SyncStatus::DownloadFailed, &e);
                    return Err(e);
                }
                Err(e) => {
                    let e = ClientError::from(e);
                    self.fail(SyncStatus::DownloadFailed, &e);
                    return Err(e);
                }
            }
        }

        let mut fetched_count = 0u64;
        for entry in manifest.entries() {
            if bodies.contains_key(&entry.name) {
                continue;
            }
            debug!(name = %entry.name, content_ref = %entry.content_ref, "fetching configuration body");
            let body = match self
                .transport
                .fetch_body(&self.api_key, &entry.name, &entry.content_ref)
            {
                Ok(body) => body,
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "body fetch failed; aborting cycle");
                    self.fail(SyncStatus::DownloadFailed, &e);
                    return Err(e);
                }
            };
            fetched_count += 1;
            bodies.insert(entry.name.clone(), body);
        }

        let state = match CachedState::new(manifest.clone(), bodies) {
            Ok(state) => state,
            Err(e) => {
                let e = ClientError::from(e);
                self.fail(SyncStatus::DownloadFailed, &e);
                return Err(e);
            }
        };
        if let Err(e) = self.store.commit(&state) {
            let e = ClientError::from(e);
            self.fail(SyncStatus::DownloadFailed, &e);
            return Err(e);
        }

        let carried_count = plan.carry_over.len() as u64;
        *self.committed.write() = Some(manifest);
        *self.pending.write() = None;
        *self.status.write() = SyncStatus::Current;
        {
            let mut stats = self.stats.write();
            stats.downloads_applied += 1;
            stats.bodies_fetched += fetched_count;
            stats.bodies_carried += carried_count;
            stats.last_error = None;
        }
        info!(
            version = state.version(),
            fetched = fetched_count,
            carried = carried_count,
            "configuration set committed"
        );

        Ok(true)
    }

    /// Resolves a lookup key to a primary entry name in the committed
    /// set, falling back to alias matching.
    pub(crate) fn resolve_name(&self, key: &str) -> Option<String> {
        let committed = self.committed.read();
        let manifest = committed.as_ref()?;
        if manifest.contains(key) {
            return Some(key.to_string());
        }
        manifest.entry_by_alias(key).map(|entry| entry.name.clone())
    }

    /// Records a failure in status and stats.
    fn fail(&self, status: SyncStatus, error: &ClientError) {
        *self.status.write() = status;
        self.stats.write().last_error = Some(error.to_string());
    }
}
