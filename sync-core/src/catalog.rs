//! Catalog of the ledgers known to a device, and garbage collection.

use std::collections::HashSet;
use std::sync::Arc;

use ledger_sync_types::{LedgerId, TransactionRecord};

use crate::device::DEVICE_KEY;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::store::{get_json, set_json, KeyValueStore};

/// Storage key of the catalog.
pub const CATALOG_KEY: &str = "ledger-app-list";

/// Outcome of [`Catalog::garbage_collect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Ledgers still listed after the sweep.
    pub ledgers_kept: usize,
    /// Catalog entries dropped because their ledger failed to load.
    pub ledgers_dropped: usize,
    /// Index entries dropped because their transaction was missing.
    pub items_pruned: usize,
    /// Stored keys deleted.
    pub keys_deleted: usize,
}

/// The ordered list of ledger identities stored on a device.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn KeyValueStore>,
}

impl Catalog {
    /// Catalog over a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Every listed ledger identity, in creation order.
    pub fn list(&self) -> Result<Vec<LedgerId>, LedgerError> {
        Ok(get_json(self.store.as_ref(), CATALOG_KEY)?.unwrap_or_default())
    }

    /// List a ledger. Returns whether it was new.
    pub fn add(&self, id: &LedgerId) -> Result<bool, LedgerError> {
        let mut ids = self.list()?;
        if ids.contains(id) {
            return Ok(false);
        }
        ids.push(id.clone());
        set_json(self.store.as_ref(), CATALOG_KEY, &ids)?;
        Ok(true)
    }

    /// Unlist a ledger. Its records stay until the next garbage collection.
    pub fn remove(&self, id: &LedgerId) -> Result<bool, LedgerError> {
        let mut ids = self.list()?;
        let before = ids.len();
        ids.retain(|listed| listed != id);
        if ids.len() == before {
            return Ok(false);
        }
        set_json(self.store.as_ref(), CATALOG_KEY, &ids)?;
        Ok(true)
    }

    /// Load every listed ledger, skipping those that fail to load.
    pub fn load_all(&self) -> Result<Vec<Ledger>, LedgerError> {
        let mut ledgers = Vec::new();
        for id in self.list()? {
            match Ledger::load(self.store.clone(), &id) {
                Ok(ledger) => ledgers.push(ledger),
                Err(LedgerError::Storage(e)) => return Err(e.into()),
                Err(e) => tracing::warn!("Skipping ledger {}: {}", id, e),
            }
        }
        Ok(ledgers)
    }

    /// Mark and sweep the store.
    ///
    /// Reachable keys are the catalog, the device identifier, every ledger
    /// that loads, and every transaction of those ledgers that is still
    /// readable. Ledgers that fail to load leave the catalog, missing
    /// transactions leave their ledger's index, and every other key is
    /// deleted.
    ///
    /// Run it with no sync session open: a live [`Ledger`] keeps its own
    /// index and writes pruned entries back on its next save.
    pub fn garbage_collect(&self) -> Result<GcReport, LedgerError> {
        let mut report = GcReport::default();
        let mut live: HashSet<String> = HashSet::new();
        live.insert(CATALOG_KEY.to_string());
        live.insert(DEVICE_KEY.to_string());

        let listed = self.list()?;
        let mut survivors = Vec::with_capacity(listed.len());
        for id in listed {
            let mut ledger = match Ledger::load(self.store.clone(), &id) {
                Ok(ledger) => ledger,
                Err(LedgerError::Storage(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("Dropping ledger {} from catalog: {}", id, e);
                    report.ledgers_dropped += 1;
                    continue;
                }
            };
            live.insert(id.to_string());

            let mut present = HashSet::new();
            for item in ledger.items() {
                if get_json::<TransactionRecord>(self.store.as_ref(), item.as_str())?.is_some() {
                    present.insert(item.clone());
                }
            }
            report.items_pruned += ledger.retain_items(|item| present.contains(item))?;
            live.extend(present.into_iter().map(|item| item.to_string()));
            survivors.push(id);
        }

        report.ledgers_kept = survivors.len();
        set_json(self.store.as_ref(), CATALOG_KEY, &survivors)?;

        for key in self.store.keys()? {
            if !live.contains(&key) {
                self.store.remove(&key)?;
                report.keys_deleted += 1;
            }
        }

        tracing::info!(
            "Garbage collection: kept {} ledgers, dropped {}, pruned {} items, deleted {} keys",
            report.ledgers_kept,
            report.ledgers_dropped,
            report.items_pruned,
            report.keys_deleted
        );
        Ok(report)
    }
}
