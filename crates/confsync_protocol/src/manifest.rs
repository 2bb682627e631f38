//! Manifest model: the server's description of the configuration set.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One named configuration document within a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique name within the manifest; the lookup key for consumers.
    pub name: String,
    /// Server-side identifier of the configuration document.
    pub config_id: Uuid,
    /// Opaque revision token for this entry's body.
    ///
    /// Two entries with equal `name` and `content_ref` are guaranteed
    /// by the server to have identical bodies, independent of the
    /// manifest version they appear in.
    pub content_ref: String,
    /// Optional secondary lookup key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ConfigEntry {
    /// Creates a new entry without an alias.
    pub fn new(
        name: impl Into<String>,
        config_id: Uuid,
        content_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            config_id,
            content_ref: content_ref.into(),
            alias: None,
        }
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Wire form of a manifest as served by the configuration service.
///
/// Entries arrive as a list; uniqueness is enforced when building the
/// [`Manifest`].
#[derive(Debug, Deserialize)]
struct ManifestWire {
    snapshot_id: Uuid,
    version: u64,
    entries: Vec<ConfigEntry>,
}

/// A versioned snapshot of the complete named configuration set.
///
/// Immutable once constructed; entry names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    snapshot_id: Uuid,
    version: u64,
    entries: BTreeMap<String, ConfigEntry>,
}

impl Manifest {
    /// Builds a manifest from a list of entries.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::DuplicateEntry`] if two entries share a
    /// name.
    pub fn from_entries(
        snapshot_id: Uuid,
        version: u64,
        entries: Vec<ConfigEntry>,
    ) -> ProtocolResult<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            let name = entry.name.clone();
            if map.insert(name.clone(), entry).is_some() {
                return Err(ProtocolError::DuplicateEntry { name });
            }
        }
        Ok(Self {
            snapshot_id,
            version,
            entries: map,
        })
    }

    /// Parses the server JSON wire form and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] for bad JSON or missing
    /// fields, [`ProtocolError::DuplicateEntry`] for repeated names.
    pub fn parse(bytes: &[u8]) -> ProtocolResult<Self> {
        let wire: ManifestWire =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::malformed(e.to_string()))?;
        Self::from_entries(wire.snapshot_id, wire.version, wire.entries)
    }

    /// The snapshot identifier assigned by the server.
    #[must_use]
    pub fn snapshot_id(&self) -> Uuid {
        self.snapshot_id
    }

    /// The manifest version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.get(name)
    }

    /// Looks up an entry by its alias.
    #[must_use]
    pub fn entry_by_alias(&self, alias: &str) -> Option<&ConfigEntry> {
        self.entries
            .values()
            .find(|e| e.alias.as_deref() == Some(alias))
    }

    /// True if an entry named `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.values()
    }

    /// Iterates entry names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, content_ref: &str) -> ConfigEntry {
        ConfigEntry::new(name, Uuid::new_v4(), content_ref)
    }

    #[test]
    fn from_entries_keeps_unique_names() {
        let manifest = Manifest::from_entries(
            Uuid::new_v4(),
            3,
            vec![entry("a.json", "h1"), entry("b.json", "h2")],
        )
        .unwrap();

        assert_eq!(manifest.version(), 3);
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains("a.json"));
        assert_eq!(manifest.entry("b.json").unwrap().content_ref, "h2");
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let result = Manifest::from_entries(
            Uuid::new_v4(),
            1,
            vec![entry("a.json", "h1"), entry("a.json", "h2")],
        );
        assert!(matches!(
            result,
            Err(ProtocolError::DuplicateEntry { name }) if name == "a.json"
        ));
    }

    #[test]
    fn parse_server_payload() {
        let payload = br#"{
            "snapshot_id": "85ffb504-cc91-4710-a0e7-e05599b19d0b",
            "version": 7,
            "entries": [
                {
                    "name": "sensors.json",
                    "config_id": "e312aa23-f8a8-4142-9a21-be640be7e547",
                    "content_ref": "h1"
                },
                {
                    "name": "limits.json",
                    "config_id": "85d0acae-4a9c-49ce-b8dc-f8a41c6c6c6a",
                    "content_ref": "h2",
                    "alias": "thresholds.json"
                }
            ]
        }"#;

        let manifest = Manifest::parse(payload).unwrap();
        assert_eq!(manifest.version(), 7);
        assert_eq!(manifest.len(), 2);
        assert_eq!(
            manifest.entry("limits.json").unwrap().alias.as_deref(),
            Some("thresholds.json")
        );
    }

    #[test]
    fn parse_rejects_bad_json() {
        let result = Manifest::parse(b"not json");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_missing_fields() {
        let result = Manifest::parse(br#"{"version": 1, "entries": []}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn alias_lookup() {
        let manifest = Manifest::from_entries(
            Uuid::new_v4(),
            1,
            vec![entry("limits.json", "h2").with_alias("thresholds.json")],
        )
        .unwrap();

        let found = manifest.entry_by_alias("thresholds.json").unwrap();
        assert_eq!(found.name, "limits.json");
        assert!(manifest.entry_by_alias("unknown").is_none());
    }

    #[test]
    fn names_are_ordered() {
        let manifest = Manifest::from_entries(
            Uuid::new_v4(),
            1,
            vec![entry("b", "h2"), entry("a", "h1"), entry("c", "h3")],
        )
        .unwrap();

        let names: Vec<&str> = manifest.names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn serde_round_trip() {
        let manifest = Manifest::from_entries(
            Uuid::new_v4(),
            5,
            vec![entry("a", "h1").with_alias("first"), entry("b", "h2")],
        )
        .unwrap();

        let encoded = serde_json::to_vec(&manifest).unwrap();
        let decoded: Manifest = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, manifest);
    }
}
