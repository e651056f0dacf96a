//! Every sync session running on a device.
//!
//! A device usually follows several ledgers at once. [`ClientRegistry`]
//! owns one [`SyncClient`] per ledger, all sharing the device identity, the
//! store and the sync configuration.

use std::sync::Arc;

use dashmap::DashMap;
use ledger_sync_core::{Catalog, Invite, KeyValueStore, Ledger, NewLedger};
use ledger_sync_types::{DeviceId, LedgerId};

use crate::client::{ClientError, SyncClient};
use crate::config::SyncConfig;
use crate::transport::Transport;

/// Registry of running sync sessions, keyed by ledger.
pub struct ClientRegistry<T: Transport + 'static> {
    store: Arc<dyn KeyValueStore>,
    device: DeviceId,
    config: SyncConfig,
    clients: DashMap<LedgerId, Arc<SyncClient<T>>>,
}

impl<T: Transport + 'static> ClientRegistry<T> {
    /// Create an empty registry.
    pub fn new(store: Arc<dyn KeyValueStore>, device: DeviceId, config: SyncConfig) -> Self {
        Self {
            store,
            device,
            config,
            clients: DashMap::new(),
        }
    }

    /// This device's identity.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Start a session for every ledger in the catalog.
    ///
    /// `transport` builds the transport of each ledger. Returns the number
    /// of sessions started.
    pub fn open_all<F>(&self, transport: F) -> Result<usize, ClientError>
    where
        F: Fn(&Ledger) -> T,
    {
        let ledgers = Catalog::new(self.store.clone()).load_all()?;
        let mut started = 0;
        for ledger in ledgers {
            if self.clients.contains_key(ledger.id()) {
                continue;
            }
            let t = transport(&ledger);
            self.register(ledger, t);
            started += 1;
        }
        tracing::info!("Started {} sync sessions", started);
        Ok(started)
    }

    /// Create a ledger and start syncing it.
    pub fn create(&self, params: NewLedger, transport: T) -> Result<Arc<SyncClient<T>>, ClientError> {
        let ledger = Ledger::create(self.store.clone(), params)?;
        Ok(self.register(ledger, transport))
    }

    /// Join a ledger from an invite and start syncing it.
    ///
    /// Joining a ledger that is already running returns its session.
    pub fn join(&self, invite: &Invite, transport: T) -> Result<Arc<SyncClient<T>>, ClientError> {
        if let Some(existing) = self.get(&invite.ledger_id) {
            return Ok(existing);
        }
        let ledger = Ledger::join(self.store.clone(), invite)?;
        Ok(self.register(ledger, transport))
    }

    /// Start syncing an already loaded ledger.
    ///
    /// Replaces any session of the same ledger; the replaced session keeps
    /// running until its owner shuts it down.
    pub fn register(&self, ledger: Ledger, transport: T) -> Arc<SyncClient<T>> {
        let id = ledger.id().clone();
        let client = Arc::new(SyncClient::start(
            ledger,
            transport,
            self.device.clone(),
            self.config.clone(),
        ));
        self.clients.insert(id, client.clone());
        client
    }

    /// The session of a ledger.
    pub fn get(&self, id: &LedgerId) -> Option<Arc<SyncClient<T>>> {
        self.clients.get(id).map(|entry| entry.value().clone())
    }

    /// Every running session.
    pub fn all(&self) -> Vec<Arc<SyncClient<T>>> {
        self.clients.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of running sessions.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no session is running.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Stop syncing a ledger and unlist it from the catalog.
    ///
    /// Its records stay in the store until the next garbage collection.
    pub async fn remove(&self, id: &LedgerId) -> Result<bool, ClientError> {
        if let Some((_, client)) = self.clients.remove(id) {
            client.shutdown().await;
        }
        let removed = Catalog::new(self.store.clone()).remove(id)?;
        if removed {
            tracing::info!("Removed ledger {}", id);
        }
        Ok(removed)
    }

    /// Shut down every session.
    pub async fn close_all(&self) {
        let ids: Vec<LedgerId> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Some((_, client)) = self.clients.remove(&id) {
                client.shutdown().await;
            }
        }
    }
}
