//! Directory-backed key-value store.
//!
//! Each key is one file named by the URL-safe base64 of the key, so any key
//! string maps to a valid file name. Writes go through a temporary file and
//! a rename, so a crash never leaves a half-written record behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ledger_sync_core::{KeyValueStore, StorageError};

const TMP_SUFFIX: &str = ".tmp";

/// Persistent store for one device, rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store in `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(URL_SAFE_NO_PAD.encode(key.as_bytes()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<bool, StorageError> {
        if self.get(key)?.as_deref() == Some(value) {
            return Ok(false);
        }
        let path = self.path(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let decoded = URL_SAFE_NO_PAD
                .decode(name)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(key) => keys.push(key),
                None => tracing::debug!("Ignoring foreign file {:?} in store", name),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_sync_core::{Catalog, Ledger, NewLedger};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_directory() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn get_missing_key_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("nothing").unwrap(), None);
    }

    #[test]
    fn set_reports_whether_bytes_changed() {
        let (_dir, store) = store();
        assert!(store.set("k", b"one").unwrap());
        assert!(!store.set("k", b"one").unwrap());
        assert!(store.set("k", b"two").unwrap());
        assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn keys_roundtrip_any_string() {
        let (_dir, store) = store();
        store.set("ledger-app-list", b"[]").unwrap();
        store.set("a/b c:\u{e9}", b"x").unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec!["a/b c:\u{e9}".to_string(), "ledger-app-list".to_string()]
        );
    }

    #[test]
    fn keys_skip_foreign_files() {
        let (_dir, store) = store();
        store.set("k", b"v").unwrap();
        fs::write(store.root().join("not base64!"), b"junk").unwrap();
        fs::write(store.root().join("abc.tmp"), b"junk").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, store) = store();
        store.set("k", b"v").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn ledgers_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
            let ledger = Ledger::create(
                store,
                NewLedger {
                    name: Some("Flat".into()),
                    ..Default::default()
                },
            )
            .unwrap();
            ledger.id().clone()
        };

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        assert_eq!(Catalog::new(store.clone()).list().unwrap(), vec![id.clone()]);
        let ledger = Ledger::load(store, &id).unwrap();
        assert_eq!(ledger.name().content, "Flat");
    }
}
