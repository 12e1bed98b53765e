//! Sealed storage: the enclave's private persistence for key material.
//!
//! Objects are opaque byte blobs addressed by a fixed identifier. Only one
//! object exists today, the enclave keypair; repository state is volatile
//! and rebuilt from genesis after a restart.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// The sealed object holding the enclave's RSA keypair.
pub const KEY_PAIR_OBJECT_ID: &str = "12345678-1234-1234-1212-121212121212";

#[derive(Error, Debug)]
#[error("sealed storage i/o: {0}")]
pub struct StoreError(#[from] io::Error);

/// A store of sealed objects.
///
/// `put` is create-or-overwrite; creating an object that already exists is
/// tolerated so the lazy keypair initialization is idempotent.
pub trait SealedStore: Send {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, id: &str, data: &[u8]) -> Result<(), StoreError>;
    fn contains(&self, id: &str) -> Result<bool, StoreError>;
}

/// A file-per-object store rooted at a directory.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(DirectoryStore { root })
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

impl SealedStore for DirectoryStore {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.object_path(id)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, id: &str, data: &[u8]) -> Result<(), StoreError> {
        // Write-then-rename so a crash never leaves a truncated key file.
        let tmp = self.object_path(&format!("{id}.tmp"));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, self.object_path(id))?;
        Ok(())
    }

    fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.object_path(id).exists())
    }
}

/// An in-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SealedStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.objects().get(id).cloned())
    }

    fn put(&self, id: &str, data: &[u8]) -> Result<(), StoreError> {
        self.objects().insert(id.to_owned(), data.to_vec());
        Ok(())
    }

    fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.objects().contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store(store: &dyn SealedStore) {
        assert_eq!(store.get("missing").unwrap(), None);
        assert!(!store.contains("missing").unwrap());

        store.put(KEY_PAIR_OBJECT_ID, b"key material").unwrap();
        assert!(store.contains(KEY_PAIR_OBJECT_ID).unwrap());
        assert_eq!(
            store.get(KEY_PAIR_OBJECT_ID).unwrap().as_deref(),
            Some(&b"key material"[..])
        );

        // Overwrite is tolerated.
        store.put(KEY_PAIR_OBJECT_ID, b"rotated").unwrap();
        assert_eq!(
            store.get(KEY_PAIR_OBJECT_ID).unwrap().as_deref(),
            Some(&b"rotated"[..])
        );
    }

    #[test]
    fn memory_store_round_trip() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn directory_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&DirectoryStore::open(dir.path()).unwrap());
    }

    #[test]
    fn directory_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirectoryStore::open(dir.path()).unwrap();
            store.put(KEY_PAIR_OBJECT_ID, b"sealed").unwrap();
        }
        let store = DirectoryStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(KEY_PAIR_OBJECT_ID).unwrap().as_deref(),
            Some(&b"sealed"[..])
        );
    }
}
