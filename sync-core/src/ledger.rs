//! Ledger - the aggregate root of one shared expense list.
//!
//! A [`Ledger`] owns the versioned metadata (name, description, participant
//! roster) and the ordered index of transaction identities. Transactions
//! themselves are stored under their own keys and only referenced here.
//!
//! Every persisted change is reported to the registered [`LedgerObserver`]s,
//! synchronously and in registration order, tagged with its [`Origin`] so
//! the sync engine knows which changes to publish.

use std::sync::Arc;

use ledger_sync_types::{
    LedgerId, LedgerRecord, Origin, ParticipantEntry, ParticipantId, Timestamp, TransactionId,
    TransactionRecord, Versioned,
};

use crate::balance::Balances;
use crate::catalog::Catalog;
use crate::error::LedgerError;
use crate::invite::{Invite, LedgerKey};
use crate::store::{get_json, set_json, KeyValueStore};
use crate::transaction::{iso_date, Transaction, DEFAULT_CURRENCY};

/// Broker used by ledgers that do not name one.
pub const DEFAULT_RELAY_ADDRESS: &str = "wss://ws.quippy.it";

/// Retired broker address, rewritten to [`DEFAULT_RELAY_ADDRESS`] on load.
pub const LEGACY_RELAY_ADDRESS: &str = "wss://ws.acondolu.me";

/// Placeholder description of a ledger that has not synced yet.
pub const DEFAULT_DESCRIPTION: &str = "Sync in progress";

/// Receives ledger change notifications.
pub trait LedgerObserver: Send + Sync {
    /// Ledger metadata, its item index or one of its stored transactions
    /// changed and was persisted.
    fn on_change(&self, ledger: &LedgerId, origin: Origin);

    /// A transaction was stored (merged or inserted).
    ///
    /// Fired on every [`Ledger::set_item`], whether or not anything changed.
    fn on_set_item(&self, ledger: &LedgerId, item: &Transaction, origin: Origin);
}

/// Handle returned by [`Ledger::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Parameters for [`Ledger::create`]. Missing values are generated or
/// filled with timestamp-zero placeholders.
#[derive(Debug, Clone, Default)]
pub struct NewLedger {
    /// Identity; random when absent.
    pub id: Option<LedgerId>,
    /// Secret; random when absent.
    pub key: Option<LedgerKey>,
    /// Broker; [`DEFAULT_RELAY_ADDRESS`] when absent.
    pub relay_address: Option<String>,
    /// Name; the identity (at timestamp zero) when absent or empty.
    pub name: Option<String>,
    /// Description; [`DEFAULT_DESCRIPTION`] (at timestamp zero) when absent or empty.
    pub description: Option<String>,
    /// Initial roster as `(id, display name)`.
    pub participants: Vec<(ParticipantId, String)>,
}

impl NewLedger {
    /// Parameters for joining a ledger from an invite.
    pub fn from_invite(invite: &Invite) -> Self {
        Self {
            id: Some(invite.ledger_id.clone()),
            key: Some(invite.key.clone()),
            relay_address: Some(invite.relay_address.clone()),
            ..Default::default()
        }
    }
}

/// A local metadata edit. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerEdit {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Participants to add or rename. Unlisted participants are kept.
    pub participants: Vec<(ParticipantId, String)>,
    /// New current user; `Some(None)` clears it.
    pub user: Option<Option<ParticipantId>>,
}

/// A live handle on one stored ledger.
pub struct Ledger {
    store: Arc<dyn KeyValueStore>,
    id: LedgerId,
    key: LedgerKey,
    relay_address: String,
    name: Versioned<String>,
    description: Versioned<String>,
    participants: Vec<(ParticipantId, Versioned<String>)>,
    items: Vec<TransactionId>,
    user: Option<ParticipantId>,
    observers: Vec<(ObserverId, Arc<dyn LedgerObserver>)>,
    next_observer: u64,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("id", &self.id)
            .field("relay_address", &self.relay_address)
            .field("name", &self.name)
            .field("participants", &self.participants.len())
            .field("items", &self.items.len())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger, register it in the catalog and persist it.
    pub fn create(store: Arc<dyn KeyValueStore>, params: NewLedger) -> Result<Self, LedgerError> {
        Self::create_at(store, params, Timestamp::now())
    }

    /// [`Ledger::create`] with an explicit clock.
    pub fn create_at(
        store: Arc<dyn KeyValueStore>,
        params: NewLedger,
        now: Timestamp,
    ) -> Result<Self, LedgerError> {
        let id = params.id.unwrap_or_else(LedgerId::random);
        let key = match params.key {
            Some(key) => key,
            None => LedgerKey::generate()?,
        };
        let name = match params.name.filter(|n| !n.is_empty()) {
            Some(name) => Versioned::new(name, now),
            None => Versioned::placeholder(id.to_string()),
        };
        let description = match params.description.filter(|d| !d.is_empty()) {
            Some(description) => Versioned::new(description, now),
            None => Versioned::placeholder(DEFAULT_DESCRIPTION.to_string()),
        };
        let mut participants: Vec<(ParticipantId, Versioned<String>)> = Vec::new();
        for (pid, display) in params.participants {
            if !participants.iter().any(|(p, _)| *p == pid) {
                participants.push((pid, Versioned::new(display, now)));
            }
        }

        let ledger = Self {
            store: store.clone(),
            id,
            key,
            relay_address: params
                .relay_address
                .unwrap_or_else(|| DEFAULT_RELAY_ADDRESS.to_string()),
            name,
            description,
            participants,
            items: Vec::new(),
            user: None,
            observers: Vec::new(),
            next_observer: 0,
        };

        Catalog::new(store).add(&ledger.id)?;
        ledger.persist()?;
        tracing::info!("Created ledger {}", ledger.id);
        Ok(ledger)
    }

    /// Join a ledger from an invite.
    ///
    /// A ledger already stored on this device is loaded and listed again
    /// rather than recreated, so its metadata and transactions survive.
    pub fn join(store: Arc<dyn KeyValueStore>, invite: &Invite) -> Result<Self, LedgerError> {
        match Self::load(store.clone(), &invite.ledger_id) {
            Ok(ledger) => {
                if ledger.key() != &invite.key {
                    tracing::warn!("Invite for ledger {} carries a different key; keeping the stored one", ledger.id);
                }
                Catalog::new(store).add(&ledger.id)?;
                tracing::info!("Rejoined stored ledger {}", ledger.id);
                Ok(ledger)
            }
            Err(LedgerError::NotFound(_)) => Self::create(store, NewLedger::from_invite(invite)),
            Err(e) => Err(e),
        }
    }

    /// Load a stored ledger.
    ///
    /// A record still pointing at [`LEGACY_RELAY_ADDRESS`] is migrated to
    /// [`DEFAULT_RELAY_ADDRESS`] and written back.
    pub fn load(store: Arc<dyn KeyValueStore>, id: &LedgerId) -> Result<Self, LedgerError> {
        let record: LedgerRecord = get_json(store.as_ref(), id.as_str())?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;

        let migrate = record.relay_address.as_deref() == Some(LEGACY_RELAY_ADDRESS);
        let relay_address = match record.relay_address {
            Some(address) if !migrate => address,
            _ => DEFAULT_RELAY_ADDRESS.to_string(),
        };

        let ledger = Self {
            store,
            id: record.id,
            key: LedgerKey::from_base64(&record.key)?,
            relay_address,
            name: record.name,
            description: record.description,
            participants: record.participants,
            items: record.items,
            user: record.user,
            observers: Vec::new(),
            next_observer: 0,
        };

        if migrate {
            tracing::info!("Migrating ledger {} to {}", ledger.id, DEFAULT_RELAY_ADDRESS);
            ledger.persist()?;
        }
        Ok(ledger)
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Ledger identity.
    pub fn id(&self) -> &LedgerId {
        &self.id
    }

    /// Shared secret.
    pub fn key(&self) -> &LedgerKey {
        &self.key
    }

    /// Broker address.
    pub fn relay_address(&self) -> &str {
        &self.relay_address
    }

    /// Versioned name.
    pub fn name(&self) -> &Versioned<String> {
        &self.name
    }

    /// Versioned description.
    pub fn description(&self) -> &Versioned<String> {
        &self.description
    }

    /// Versioned participant roster.
    pub fn participants(&self) -> &[(ParticipantId, Versioned<String>)] {
        &self.participants
    }

    /// Transaction index in display order.
    pub fn items(&self) -> &[TransactionId] {
        &self.items
    }

    /// The participant this device acts as.
    pub fn user(&self) -> Option<&ParticipantId> {
        self.user.as_ref()
    }

    /// `(id, display name)` of every participant.
    pub fn participant_list(&self) -> Vec<(ParticipantId, String)> {
        self.participants
            .iter()
            .map(|(id, name)| (id.clone(), name.content.clone()))
            .collect()
    }

    /// The roster as carried by a broadcast.
    pub fn participant_entries(&self) -> Vec<ParticipantEntry> {
        self.participants
            .iter()
            .map(|(id, name)| ParticipantEntry {
                value: id.clone(),
                text: name.clone(),
            })
            .collect()
    }

    /// An invite for another device.
    pub fn invite(&self) -> Invite {
        Invite::new(self.id.clone(), self.key.clone(), self.relay_address.clone())
    }

    // ===========================================
    // Observers
    // ===========================================

    /// Register an observer.
    pub fn subscribe(&mut self, observer: Arc<dyn LedgerObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn notify_change(&self, origin: Origin) {
        for (_, observer) in &self.observers {
            observer.on_change(&self.id, origin);
        }
    }

    fn notify_set_item(&self, item: &Transaction, origin: Origin) {
        for (_, observer) in &self.observers {
            observer.on_set_item(&self.id, item, origin);
        }
    }

    // ===========================================
    // Metadata
    // ===========================================

    /// Apply a local metadata edit now.
    pub fn update_local(&mut self, edit: LedgerEdit) -> Result<bool, LedgerError> {
        self.update_local_at(edit, Timestamp::now())
    }

    /// Apply a local metadata edit at `now`.
    ///
    /// Changed fields are stamped `now`; participants are upserted, never
    /// removed. Persists and notifies with [`Origin::Local`] iff anything
    /// changed.
    pub fn update_local_at(&mut self, edit: LedgerEdit, now: Timestamp) -> Result<bool, LedgerError> {
        let mut changed = false;
        if let Some(name) = edit.name {
            changed |= self.name.set(name, now);
        }
        if let Some(description) = edit.description {
            changed |= self.description.set(description, now);
        }
        if let Some(user) = edit.user {
            if self.user != user {
                self.user = user;
                changed = true;
            }
        }
        for (pid, display) in edit.participants {
            match self.participants.iter_mut().find(|(p, _)| *p == pid) {
                Some((_, name)) => changed |= name.set(display, now),
                None => {
                    self.participants.push((pid, Versioned::new(display, now)));
                    changed = true;
                }
            }
        }

        if changed {
            self.save(Origin::Local)?;
        }
        Ok(changed)
    }

    /// Merge metadata received from a peer.
    ///
    /// Each field resolves independently with the same rule as transaction
    /// fields. Persists and notifies with [`Origin::Remote`] iff anything
    /// changed.
    pub fn merge_remote(
        &mut self,
        name: &Versioned<String>,
        description: &Versioned<String>,
        participants: &[ParticipantEntry],
    ) -> Result<bool, LedgerError> {
        let mut changed = false;
        changed |= self.name.merge(name);
        changed |= self.description.merge(description);
        for entry in participants {
            match self.participants.iter_mut().find(|(p, _)| *p == entry.value) {
                Some((_, held)) => changed |= held.merge(&entry.text),
                None => {
                    self.participants.push((entry.value.clone(), entry.text.clone()));
                    changed = true;
                }
            }
        }

        if changed {
            self.save(Origin::Remote)?;
        }
        Ok(changed)
    }

    // ===========================================
    // Transactions
    // ===========================================

    /// Store a transaction.
    ///
    /// A transaction already held is merged with the incoming copy and the
    /// merged result is stored; a new one is stored as is and appended to
    /// the index. Observers always get `on_set_item` with the stored value;
    /// `on_change` fires first when the stored bytes changed or the index
    /// grew.
    pub fn set_item(&mut self, item: Transaction, origin: Origin) -> Result<Transaction, LedgerError> {
        let stored = match self.get_item(&item.id)? {
            Some(mut current) => {
                current.merge_with(&item);
                current
            }
            None => item,
        };
        let mut changed = set_json(self.store.as_ref(), stored.id.as_str(), &stored.to_record())?;

        if !self.items.contains(&stored.id) {
            self.items.push(stored.id.clone());
            changed = true;
        }
        if changed {
            self.save(origin)?;
        }
        self.notify_set_item(&stored, origin);
        Ok(stored)
    }

    /// Every readable transaction, in index order.
    ///
    /// Missing or corrupt records are skipped.
    pub fn get_items(&self) -> Result<Vec<Transaction>, LedgerError> {
        let mut items = Vec::with_capacity(self.items.len());
        for id in &self.items {
            if let Some(item) = self.get_item(id)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// One transaction, or `None` when missing or corrupt.
    pub fn get_item(&self, id: &TransactionId) -> Result<Option<Transaction>, LedgerError> {
        Ok(get_json::<TransactionRecord>(self.store.as_ref(), id.as_str())?
            .map(Transaction::from_record))
    }

    /// A fresh, unsaved transaction seeded with defaults.
    pub fn new_transaction(&self) -> Transaction {
        self.new_transaction_at(Timestamp::now(), DEFAULT_CURRENCY)
    }

    /// [`Ledger::new_transaction`] with an explicit clock and currency.
    ///
    /// The current user pays, every participant shares with weight 1, and
    /// the effective date is today. All fields but the date sit at
    /// timestamp zero.
    pub fn new_transaction_at(&self, now: Timestamp, currency: &str) -> Transaction {
        let mut item = Transaction::new(TransactionId::random(), now);
        let payees: Vec<ParticipantId> = self.participants.iter().map(|(p, _)| p.clone()).collect();
        item.currency = Versioned::placeholder(currency.to_string());
        item.paid_by = Versioned::placeholder(self.user.clone().unwrap_or_else(|| ParticipantId::new("")));
        item.weights = Versioned::placeholder(vec![1.0; payees.len()]);
        item.paid_for = Versioned::placeholder(payees);
        item.effective_date = Versioned::new(iso_date(now), now);
        item
    }

    /// Net balances over every readable transaction.
    pub fn balances(&self) -> Result<Balances, LedgerError> {
        Ok(Balances::compute(&self.get_items()?))
    }

    /// Keep only index entries for which `keep` holds. Persists without
    /// notifying. Returns how many entries were dropped.
    pub(crate) fn retain_items<F>(&mut self, keep: F) -> Result<usize, LedgerError>
    where
        F: Fn(&TransactionId) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|id| keep(id));
        let dropped = before - self.items.len();
        if dropped > 0 {
            self.persist()?;
        }
        Ok(dropped)
    }

    // ===========================================
    // Persistence
    // ===========================================

    /// The stored form of this ledger.
    pub fn to_record(&self) -> LedgerRecord {
        LedgerRecord {
            relay_address: Some(self.relay_address.clone()),
            id: self.id.clone(),
            key: self.key.to_base64(),
            name: self.name.clone(),
            description: self.description.clone(),
            participants: self.participants.clone(),
            items: self.items.clone(),
            user: self.user.clone(),
        }
    }

    fn persist(&self) -> Result<bool, LedgerError> {
        Ok(set_json(self.store.as_ref(), self.id.as_str(), &self.to_record())?)
    }

    fn save(&self, origin: Origin) -> Result<(), LedgerError> {
        self.persist()?;
        self.notify_change(origin);
        Ok(())
    }
}
