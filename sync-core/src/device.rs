//! The process-wide device identifier.

use ledger_sync_types::DeviceId;

use crate::store::{get_json, set_json, KeyValueStore, StorageError};

/// Storage key holding the device identifier.
pub const DEVICE_KEY: &str = "device-id";

/// Load the device identifier, generating and persisting one on first use.
///
/// Every envelope a device publishes is tagged with this identifier, which
/// is how a device recognises its own messages coming back from the broker.
pub fn load_or_create_device_id(store: &dyn KeyValueStore) -> Result<DeviceId, StorageError> {
    if let Some(id) = get_json::<DeviceId>(store, DEVICE_KEY)? {
        return Ok(id);
    }
    let id = DeviceId::random();
    set_json(store, DEVICE_KEY, &id)?;
    tracing::info!("Generated device id {}", id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn device_id_is_stable() {
        let store = MemoryStore::new();
        let first = load_or_create_device_id(&store).unwrap();
        let second = load_or_create_device_id(&store).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_device_id_is_regenerated() {
        let store = MemoryStore::new();
        store.set(DEVICE_KEY, b"\xff\xfe").unwrap();
        let id = load_or_create_device_id(&store).unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(load_or_create_device_id(&store).unwrap(), id);
    }
}
