//! Cache store trait definition.

use crate::error::StoreResult;
use crate::state::CachedState;

/// Durable storage for the last fully synced configuration set.
///
/// A store holds at most one committed [`CachedState`] at a time and
/// replaces it atomically.
///
/// # Invariants
///
/// - `commit` makes the entire new state visible, or, on any failure,
///   leaves the previous state fully visible; nothing in between
/// - `load` and `read_body` only ever observe a committed state
/// - Implementations follow a single-writer, multi-reader discipline
///   and must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::DirStore`] - durable, directory-backed
/// - [`super::MemoryStore`] - for testing
pub trait CacheStore: Send + Sync {
    /// Returns the last durably committed state.
    ///
    /// Returns `None` when no prior successful sync exists, or when the
    /// stored artifacts are unreadable or fail their integrity check (a
    /// damaged cache is treated as absent, not fatal).
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures while reading.
    fn load(&self) -> StoreResult<Option<CachedState>>;

    /// Atomically replaces the committed state with `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the new state could not be made durable; the
    /// previously committed state remains visible in that case.
    fn commit(&self, state: &CachedState) -> StoreResult<()>;

    /// Returns the body for `name` from the committed state.
    ///
    /// `Ok(None)` for names the committed manifest does not know.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_body(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Returns the version of the committed manifest, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn committed_version(&self) -> StoreResult<Option<u64>>;
}
