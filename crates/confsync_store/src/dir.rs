//! Directory-backed cache store with atomic generation switch.
//!
//! This module handles the file system layout of the cache:
//!
//! ```text
//! <root>/
//! ├─ LOCK              # Advisory lock for single-writer access
//! ├─ CURRENT           # Name of the live generation directory
//! └─ gen-000001/
//!    ├─ state.json     # Manifest + body digests
//!    └─ <entry name>   # One file per configuration body
//! ```
//!
//! A commit writes a complete new generation directory and then swaps
//! the CURRENT pointer with a write-then-rename. Readers resolve
//! CURRENT first, so they observe either the old or the new generation,
//! never a mixture. The LOCK file ensures only one process writes to
//! the cache at a time.

use crate::error::{StoreError, StoreResult};
use crate::state::CachedState;
use crate::store::CacheStore;
use confsync_protocol::Manifest;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File names within the cache directory.
const LOCK_FILE: &str = "LOCK";
const CURRENT_FILE: &str = "CURRENT";
/// Temporary file for atomic CURRENT writes.
const CURRENT_TEMP: &str = "CURRENT.tmp";
const STATE_FILE: &str = "state.json";
const GEN_PREFIX: &str = "gen-";

/// Current cache metadata format version.
const STATE_FORMAT_VERSION: u32 = 1;

/// On-disk metadata of one generation.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    format_version: u32,
    manifest: Manifest,
    digests: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Inner {
    /// Name of the live generation directory, if any.
    current: Option<String>,
    /// Next generation number to allocate.
    next_gen: u64,
}

/// A durable, directory-backed cache store.
///
/// # Thread Safety
///
/// The store is safe to share across threads. A commit holds the write
/// half of an internal lock, so readers observe the old generation
/// until the switch completes. Only one `DirStore` instance can exist
/// per directory at a time (advisory LOCK file).
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    inner: RwLock<Inner>,
    /// Lock file handle, held for exclusive access.
    _lock_file: File,
}

impl DirStore {
    /// Opens or creates a cache directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the
    /// cache lock, or an I/O error if the directory cannot be prepared.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let current = match fs::read_to_string(root.join(CURRENT_FILE)) {
            Ok(contents) => {
                let name = contents.trim().to_string();
                if name.is_empty() {
                    None
                } else {
                    Some(name)
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::Io(e)),
        };
        match &current {
            Some(generation) => info!(generation = %generation, "opened configuration cache"),
            None => info!("opened empty configuration cache"),
        }

        let mut next_gen = 1;
        for entry in fs::read_dir(&root)?.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(number) = name
                    .strip_prefix(GEN_PREFIX)
                    .and_then(|s| s.parse::<u64>().ok())
                {
                    next_gen = next_gen.max(number + 1);
                }
            }
        }

        Ok(Self {
            root,
            inner: RwLock::new(Inner { current, next_gen }),
            _lock_file: lock_file,
        })
    }

    /// Returns the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads and validates a generation's metadata file.
    ///
    /// Unreadable or newer-format metadata yields `Ok(None)`: the cache
    /// is treated as absent rather than failing the caller.
    fn read_state_file(&self, gen_dir: &Path) -> StoreResult<Option<StateFile>> {
        let path = gen_dir.join(STATE_FILE);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "cache metadata missing");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let state_file: StateFile = match serde_json::from_slice(&data) {
            Ok(state_file) => state_file,
            Err(e) => {
                warn!(error = %e, "cache metadata unreadable; treating cache as absent");
                return Ok(None);
            }
        };

        if state_file.format_version > STATE_FORMAT_VERSION {
            warn!(
                found = state_file.format_version,
                supported = STATE_FORMAT_VERSION,
                "cache metadata has a newer format; treating cache as absent"
            );
            return Ok(None);
        }

        Ok(Some(state_file))
    }

    /// Writes a complete new generation directory: bodies first, then
    /// the metadata file, each synced to disk.
    fn write_generation(&self, gen_dir: &Path, state: &CachedState) -> StoreResult<()> {
        fs::create_dir_all(gen_dir)?;

        for (name, body) in state.bodies() {
            let path = body_path(gen_dir, name)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&path)?;
            file.write_all(body)?;
            file.sync_all()?;
        }

        let metadata = StateFile {
            format_version: STATE_FORMAT_VERSION,
            manifest: state.manifest().clone(),
            digests: state.digests().clone(),
        };
        let data = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| StoreError::Corrupted(format!("state metadata encode: {e}")))?;
        let mut file = File::create(gen_dir.join(STATE_FILE))?;
        file.write_all(&data)?;
        file.sync_all()?;

        sync_dir(gen_dir)
    }

    /// Atomically repoints CURRENT at `gen_name`.
    ///
    /// Uses write-then-rename for crash safety:
    /// 1. Write the new pointer to a temporary file
    /// 2. Sync the temporary file to disk
    /// 3. Rename it over CURRENT
    /// 4. Fsync the cache root so the rename is durable
    fn switch_current(&self, gen_name: &str) -> StoreResult<()> {
        let temp_path = self.root.join(CURRENT_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(gen_name.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.root.join(CURRENT_FILE))?;
        sync_dir(&self.root)
    }

    /// Removes every generation directory except `current`, best-effort.
    ///
    /// This also cleans up partial generations left behind by an
    /// interrupted commit.
    fn remove_stale_generations(&self, current: &str) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "could not scan cache directory for stale generations");
                return;
            }
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(GEN_PREFIX) && name != current {
                debug!(generation = name, "removing stale generation");
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    warn!(generation = name, error = %e, "could not remove stale generation");
                }
            }
        }
    }
}

impl CacheStore for DirStore {
    fn load(&self) -> StoreResult<Option<CachedState>> {
        let inner = self.inner.read();
        let Some(generation) = inner.current.as_deref() else {
            debug!("no cached configuration data found");
            return Ok(None);
        };
        let gen_dir = self.root.join(generation);

        let Some(state_file) = self.read_state_file(&gen_dir)? else {
            return Ok(None);
        };

        let mut bodies = BTreeMap::new();
        for name in state_file.manifest.names() {
            let Ok(path) = body_path(&gen_dir, name) else {
                warn!(name, "unstorable entry name in cache metadata; treating cache as absent");
                return Ok(None);
            };
            match fs::read(&path) {
                Ok(body) => {
                    bodies.insert(name.to_string(), body);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(name, "cached body missing; treating cache as absent");
                    return Ok(None);
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }

        match CachedState::restore(state_file.manifest, bodies, &state_file.digests) {
            Ok(state) => Ok(Some(state)),
            Err(StoreError::Io(e)) => Err(StoreError::Io(e)),
            Err(e) => {
                warn!(error = %e, "cached state failed verification; treating cache as absent");
                Ok(None)
            }
        }
    }

    fn commit(&self, state: &CachedState) -> StoreResult<()> {
        for name in state.manifest().names() {
            validate_entry_name(name)?;
        }

        let mut inner = self.inner.write();
        let gen_name = format!("{GEN_PREFIX}{:06}", inner.next_gen);
        inner.next_gen += 1;
        let gen_dir = self.root.join(&gen_name);

        if let Err(e) = self.write_generation(&gen_dir, state) {
            warn!(generation = %gen_name, error = %e, "commit aborted; removing partial generation");
            let _ = fs::remove_dir_all(&gen_dir);
            return Err(e);
        }

        if let Err(e) = self.switch_current(&gen_name) {
            warn!(generation = %gen_name, error = %e, "pointer switch failed; removing staged generation");
            let _ = fs::remove_dir_all(&gen_dir);
            return Err(e);
        }

        inner.current = Some(gen_name.clone());
        drop(inner);

        self.remove_stale_generations(&gen_name);
        info!(
            generation = %gen_name,
            version = state.version(),
            entries = state.manifest().len(),
            "committed configuration set"
        );
        Ok(())
    }

    fn read_body(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.read();
        let Some(generation) = inner.current.as_deref() else {
            return Ok(None);
        };
        let gen_dir = self.root.join(generation);
        let Ok(path) = body_path(&gen_dir, name) else {
            return Ok(None);
        };

        match fs::read(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn committed_version(&self) -> StoreResult<Option<u64>> {
        let inner = self.inner.read();
        let Some(generation) = inner.current.as_deref() else {
            return Ok(None);
        };
        let gen_dir = self.root.join(generation);
        Ok(self
            .read_state_file(&gen_dir)?
            .map(|state_file| state_file.manifest.version()))
    }
}

/// Maps an entry name to its file path within a generation directory.
fn body_path(gen_dir: &Path, name: &str) -> StoreResult<PathBuf> {
    validate_entry_name(name)?;
    Ok(gen_dir.join(name))
}

/// Entry names become relative paths inside the generation directory,
/// so anything that could escape it or collide with the metadata file
/// is rejected.
fn validate_entry_name(name: &str) -> StoreResult<()> {
    let invalid = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').next() == Some(STATE_FILE)
        || name
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(StoreError::InvalidEntryName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Fsyncs a directory so entry creations and renames are durable.
///
/// On Windows the NTFS journal covers metadata durability and directory
/// fsync is not supported, so this is a no-op there.
#[cfg(unix)]
fn sync_dir(path: &Path) -> StoreResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> StoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_protocol::ConfigEntry;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn make_state(version: u64, entries: &[(&str, &[u8])]) -> CachedState {
        let manifest = Manifest::from_entries(
            Uuid::new_v4(),
            version,
            entries
                .iter()
                .map(|(name, body)| {
                    ConfigEntry::new(*name, Uuid::new_v4(), crate::body_digest(body))
                })
                .collect(),
        )
        .unwrap();
        let bodies = entries
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_vec()))
            .collect();
        CachedState::new(manifest, bodies).unwrap()
    }

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache");

        let store = DirStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _store = DirStore::open(temp.path()).unwrap();

        let result = DirStore::open(temp.path());
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _store = DirStore::open(temp.path()).unwrap();
        }
        let _store = DirStore::open(temp.path()).unwrap();
    }

    #[test]
    fn commit_then_load_round_trip() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        let state = make_state(1, &[("a.json", b"{}"), ("b.json", b"[1,2]")]);
        store.commit(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.committed_version().unwrap(), Some(1));
        assert_eq!(store.read_body("a.json").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.read_body("missing").unwrap(), None);
    }

    #[test]
    fn commit_survives_reopen() {
        let temp = tempdir().unwrap();
        let state = make_state(3, &[("a.json", b"persisted")]);

        {
            let store = DirStore::open(temp.path()).unwrap();
            store.commit(&state).unwrap();
        }

        let store = DirStore::open(temp.path()).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), state);
        assert_eq!(store.committed_version().unwrap(), Some(3));
    }

    #[test]
    fn commit_replaces_previous_state() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        store
            .commit(&make_state(1, &[("a.json", b"old"), ("gone.json", b"x")]))
            .unwrap();
        store.commit(&make_state(2, &[("a.json", b"new")])).unwrap();

        assert_eq!(store.committed_version().unwrap(), Some(2));
        assert_eq!(store.read_body("a.json").unwrap(), Some(b"new".to_vec()));
        // Bodies from the replaced generation are gone with it.
        assert_eq!(store.read_body("gone.json").unwrap(), None);

        let generations: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .filter(|n| n.starts_with(GEN_PREFIX))
            .collect();
        assert_eq!(generations.len(), 1);
    }

    #[test]
    fn nested_entry_names() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        let state = make_state(1, &[("sensors/temp.json", b"42")]);
        store.commit(&state).unwrap();

        assert_eq!(
            store.read_body("sensors/temp.json").unwrap(),
            Some(b"42".to_vec())
        );
        assert_eq!(store.load().unwrap().unwrap(), state);
    }

    #[test]
    fn escaping_entry_name_rejected() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        for name in ["../escape", "/abs", "", "a//b", "state.json", "state.json/x"] {
            let state = make_state(1, &[(name, b"x")]);
            let result = store.commit(&state);
            assert!(
                matches!(result, Err(StoreError::InvalidEntryName { .. })),
                "name {name:?} should be rejected"
            );
        }
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_metadata_loads_as_absent() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        store.commit(&make_state(1, &[("a.json", b"{}")])).unwrap();

        let gen_dir = temp.path().join(format!("{GEN_PREFIX}{:06}", 1));
        fs::write(gen_dir.join(STATE_FILE), b"not json").unwrap();

        assert!(store.load().unwrap().is_none());
        assert_eq!(store.committed_version().unwrap(), None);
    }

    #[test]
    fn newer_format_version_loads_as_absent() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        store.commit(&make_state(1, &[("a.json", b"{}")])).unwrap();

        let gen_dir = temp.path().join(format!("{GEN_PREFIX}{:06}", 1));
        let data = fs::read_to_string(gen_dir.join(STATE_FILE)).unwrap();
        let data = data.replacen("\"format_version\": 1", "\"format_version\": 99", 1);
        fs::write(gen_dir.join(STATE_FILE), data).unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn tampered_body_loads_as_absent() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        store.commit(&make_state(1, &[("a.json", b"{}")])).unwrap();

        let gen_dir = temp.path().join(format!("{GEN_PREFIX}{:06}", 1));
        fs::write(gen_dir.join("a.json"), b"tampered").unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn unswitched_generation_is_invisible() {
        // A generation directory without a CURRENT update is what an
        // interrupted commit leaves behind; it must not surface.
        let temp = tempdir().unwrap();
        {
            let store = DirStore::open(temp.path()).unwrap();
            store.commit(&make_state(1, &[("a.json", b"live")])).unwrap();
        }

        let orphan = temp.path().join(format!("{GEN_PREFIX}{:06}", 9));
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join("a.json"), b"orphan").unwrap();

        let store = DirStore::open(temp.path()).unwrap();
        assert_eq!(store.read_body("a.json").unwrap(), Some(b"live".to_vec()));

        // The next commit allocates past the orphan and cleans it up.
        store.commit(&make_state(2, &[("a.json", b"newer")])).unwrap();
        assert!(!orphan.exists());
        assert_eq!(store.read_body("a.json").unwrap(), Some(b"newer".to_vec()));
    }

    #[test]
    fn read_body_never_exposes_metadata() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        store.commit(&make_state(1, &[("a.json", b"{}")])).unwrap();

        assert_eq!(store.read_body(STATE_FILE).unwrap(), None);
        assert_eq!(store.read_body("../LOCK").unwrap(), None);
    }
}
