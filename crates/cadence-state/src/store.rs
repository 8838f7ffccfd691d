//! Opaque key/value blob stores.
//!
//! A store only moves bytes: it never looks inside a blob. [`MemoryStore`]
//! keeps blobs in a map for tests and in-process handoff; [`DirStore`] keeps
//! one file per key under a directory.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{Result, StateError};

/// Key/value storage for encoded state.
pub trait BlobStore: Send + Sync {
    /// Blob stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `blob` under `key`, replacing any previous value.
    fn set(&self, key: &str, blob: &[u8]) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.blobs.write().insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}

/// One file per key under a root directory.
///
/// Keys must be plain file names: non-empty, without path separators, and
/// not `.` or `..`. Writes go to a temporary sibling first and are renamed
/// into place, so a reader never sees a partial blob.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StateError::store(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let plain = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\'])
            && !key.contains('\0');
        if !plain {
            return Err(StateError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::store(key, e)),
        }
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{key}.tmp"));
        fs::write(&tmp, blob).map_err(|e| StateError::store(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| StateError::store(key, e))?;
        tracing::trace!(key, bytes = blob.len(), "blob written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", b"one").unwrap();
        store.set("a", b"two").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn dir_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path().join("nested")).unwrap();
        assert_eq!(store.get("state").unwrap(), None);
        store.set("state", &[1, 2, 3]).unwrap();
        assert_eq!(store.get("state").unwrap(), Some(vec![1, 2, 3]));
        assert!(store.root().join("state").exists());
    }

    #[test]
    fn dir_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path()).unwrap();
        for key in ["", ".", "..", "a/b", "..\\x"] {
            assert!(
                matches!(store.set(key, b"x"), Err(StateError::InvalidKey(_))),
                "key {key:?}"
            );
        }
    }
}
