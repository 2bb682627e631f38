//! The persisted unit: a fully downloaded manifest plus its bodies.

use crate::error::{StoreError, StoreResult};
use confsync_protocol::Manifest;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A manifest together with the complete set of downloaded bodies.
///
/// The constructor enforces that the body key set equals exactly the
/// manifest's entry names, so a partial state is not representable and
/// therefore never persistable. A reader of the cache can never observe
/// a manifest that references a missing body, or a body without a
/// manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedState {
    manifest: Manifest,
    bodies: BTreeMap<String, Vec<u8>>,
    digests: BTreeMap<String, String>,
}

impl CachedState {
    /// Builds a cached state, verifying the manifest/bodies keyset match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InconsistentState`] if any manifest entry
    /// has no body or any body has no manifest entry.
    pub fn new(manifest: Manifest, bodies: BTreeMap<String, Vec<u8>>) -> StoreResult<Self> {
        for name in manifest.names() {
            if !bodies.contains_key(name) {
                return Err(StoreError::InconsistentState(format!(
                    "missing body for manifest entry {name:?}"
                )));
            }
        }
        for name in bodies.keys() {
            if !manifest.contains(name) {
                return Err(StoreError::InconsistentState(format!(
                    "body {name:?} has no manifest entry"
                )));
            }
        }

        let digests = bodies
            .iter()
            .map(|(name, body)| (name.clone(), body_digest(body)))
            .collect();

        Ok(Self {
            manifest,
            bodies,
            digests,
        })
    }

    /// Rebuilds a state read back from storage, verifying body digests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] when a body no longer matches
    /// its recorded digest, [`StoreError::InconsistentState`] on keyset
    /// mismatch.
    pub(crate) fn restore(
        manifest: Manifest,
        bodies: BTreeMap<String, Vec<u8>>,
        digests: &BTreeMap<String, String>,
    ) -> StoreResult<Self> {
        for (name, body) in &bodies {
            match digests.get(name) {
                Some(expected) if *expected == body_digest(body) => {}
                Some(_) => {
                    return Err(StoreError::Corrupted(format!(
                        "body {name:?} does not match its recorded digest"
                    )));
                }
                None => {
                    return Err(StoreError::Corrupted(format!(
                        "no digest recorded for body {name:?}"
                    )));
                }
            }
        }
        Self::new(manifest, bodies)
    }

    /// The committed manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Version of the committed manifest.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.manifest.version()
    }

    /// The body for `name`, if present.
    #[must_use]
    pub fn body(&self, name: &str) -> Option<&[u8]> {
        self.bodies.get(name).map(Vec::as_slice)
    }

    /// All bodies, keyed by entry name.
    #[must_use]
    pub fn bodies(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.bodies
    }

    /// Hex SHA-256 digests of the bodies, keyed by entry name.
    #[must_use]
    pub fn digests(&self) -> &BTreeMap<String, String> {
        &self.digests
    }
}

/// Hex SHA-256 digest of a configuration body.
#[must_use]
pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
