//! Local key-value persistence.
//!
//! The ledger model needs only three things from its backing store: read a
//! key, write a key (learning whether the bytes changed), and enumerate keys
//! for garbage collection. Any engine that offers that can back a device.
//!
//! Records are JSON. A record that fails to parse is treated as corrupt:
//! it is deleted and reported absent, never surfaced as an error.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem or device I/O failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing engine failed for another reason.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A value could not be encoded for storage.
    #[error("could not encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Byte-oriented key-value store backing one device.
///
/// Implementations use interior mutability so one store can be shared by
/// every ledger on the device.
pub trait KeyValueStore: Send + Sync {
    /// Read a key.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a key. Returns whether the stored bytes changed.
    fn set(&self, key: &str, value: &[u8]) -> Result<bool, StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Read and decode a JSON record.
///
/// A record that does not decode as `T` is deleted and reported as absent.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Dropping corrupt record {}: {}", key, e);
            store.remove(key)?;
            Ok(None)
        }
    }
}

/// Encode and write a JSON record. Returns whether the stored bytes changed.
pub fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<bool, StorageError> {
    let bytes = serde_json::to_vec(value).map_err(StorageError::Encode)?;
    store.set(key, &bytes)
}

/// In-memory store, for tests and ephemeral devices.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<bool, StorageError> {
        let mut entries = self.entries()?;
        if entries.get(key).map(Vec::as_slice) == Some(value) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries()?.keys().cloned().collect())
    }
}
