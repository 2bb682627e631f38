//! Version comparison between a fetched and a cached manifest.

use confsync_protocol::Manifest;

/// The comparator's verdict on a freshly fetched manifest.
///
/// Pure and total: defined for every manifest pair, including "no cache
/// yet". The partition drives the selective download: only `to_fetch`
/// bodies travel over the network, `carry_over` bodies are reused from
/// the committed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Whether a download cycle is required.
    pub needs_update: bool,
    /// Entries whose body must be fetched (new name or changed revision).
    pub to_fetch: Vec<String>,
    /// Entries whose cached body can be reused unchanged.
    pub carry_over: Vec<String>,
}

impl SyncPlan {
    /// Compares a fetched manifest against the committed one.
    ///
    /// An update is needed when there is no cached manifest, the
    /// version differs, any entry's content revision differs (even at
    /// equal version, guarding against a server-side re-stamp without a
    /// version bump), or the entry set shrank (a removed entry forces a
    /// re-commit so its body is dropped).
    #[must_use]
    pub fn compute(fetched: &Manifest, cached: Option<&Manifest>) -> Self {
        let mut to_fetch = Vec::new();
        let mut carry_over = Vec::new();

        for entry in fetched.entries() {
            match cached.and_then(|manifest| manifest.entry(&entry.name)) {
                Some(prev) if prev.content_ref == entry.content_ref => {
                    carry_over.push(entry.name.clone());
                }
                _ => to_fetch.push(entry.name.clone()),
            }
        }

        let needs_update = match cached {
            None => true,
            Some(prev) => {
                prev.version() != fetched.version()
                    || !to_fetch.is_empty()
                    || prev.len() != fetched.len()
            }
        };

        Self {
            needs_update,
            to_fetch,
            carry_over,
        }
    }
}
