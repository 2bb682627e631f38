//! In-memory cache store for testing.

use crate::error::{StoreError, StoreResult};
use crate::state::CachedState;
use crate::store::CacheStore;
use parking_lot::RwLock;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory cache store.
///
/// Holds the committed state in memory with the same replace semantics
/// as the durable store. Suitable for unit and integration tests; a
/// commit failure can be injected to exercise abort paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Option<CachedState>>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with a committed state.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_state(state: CachedState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Makes the next `commit` call fail without replacing the state.
    pub fn set_fail_next_commit(&self, fail: bool) {
        self.fail_next_commit.store(fail, Ordering::SeqCst);
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> StoreResult<Option<CachedState>> {
        Ok(self.state.read().clone())
    }

    fn commit(&self, state: &CachedState) -> StoreResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected commit failure",
            )));
        }
        *self.state.write() = Some(state.clone());
        Ok(())
    }

    fn read_body(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .state
            .read()
            .as_ref()
            .and_then(|state| state.body(name).map(<[u8]>::to_vec)))
    }

    fn committed_version(&self) -> StoreResult<Option<u64>> {
        Ok(self.state.read().as_ref().map(CachedState::version))
    }
}
