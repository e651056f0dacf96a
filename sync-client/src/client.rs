//! SyncClient - the sync engine for one ledger.
//!
//! This module provides [`SyncClient`], which keeps one [`Ledger`] converged
//! with its peers over a [`Transport`].
//!
//! # Architecture
//!
//! SyncClient uses a pure state machine (from sync-core) for the channel
//! lifecycle and interprets its actions to perform actual I/O. All I/O and
//! all merging happen on one driver task, so envelopes are applied one at a
//! time in arrival order.
//!
//! ```text
//! Ledger ──observer──► driver ──encrypt──► Transport ──► broker
//!   ▲                    │
//!   └──── merge ◄────────┴──decrypt◄── Transport ◄── broker
//!                        ↓
//!               sync-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ledger_sync_client::{MemoryBroker, SyncClient, SyncConfig};
//!
//! let broker = MemoryBroker::new();
//! let client = SyncClient::start(ledger, broker.transport(), device, SyncConfig::default());
//! client.wait_for_state(ChannelState::Connected).await?;
//! client.add_transaction(item).await?;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use ledger_sync_core::{
    Action, BroadcastDelay, ChannelState, Event, Ledger, LedgerEdit, LedgerError, LedgerObserver,
    ObserverId, Transaction, TransactionEdit,
};
use ledger_sync_types::{
    ChannelId, DeviceId, Envelope, LedgerId, Origin, SyncError, TransactionId, TransactionRecord,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::config::SyncConfig;
use crate::crypto::{CryptoError, LedgerCipher};
use crate::transport::{Transport, TransportError};

/// Capacity of the [`ClientEvent`] channel.
const EVENT_CAPACITY: usize = 256;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Envelope encoding error.
    #[error("wire format error: {0}")]
    Wire(#[from] SyncError),

    /// The operation is not allowed in the current channel state.
    #[error("not allowed while {0}")]
    InvalidState(ChannelState),

    /// No such transaction in the ledger.
    #[error("transaction not found: {0}")]
    ItemNotFound(TransactionId),

    /// The session's driver task has stopped.
    #[error("sync session shut down")]
    Closed,
}

/// Notifications emitted by a [`SyncClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The channel moved to a new state.
    StateChanged(ChannelState),
    /// Ledger metadata changed.
    LedgerChanged {
        /// The ledger.
        ledger: LedgerId,
        /// Where the change came from.
        origin: Origin,
    },
    /// A transaction was stored.
    ItemSet {
        /// The ledger.
        ledger: LedgerId,
        /// The transaction.
        id: TransactionId,
        /// Where the change came from.
        origin: Origin,
    },
}

enum LocalUpdate {
    Changed,
    Item(TransactionRecord),
}

enum Command {
    Reconnect,
    Close,
    Shutdown,
}

/// Bridges ledger notifications to the driver and to event subscribers.
struct Forwarder {
    local: mpsc::UnboundedSender<LocalUpdate>,
    events: broadcast::Sender<ClientEvent>,
}

impl LedgerObserver for Forwarder {
    fn on_change(&self, ledger: &LedgerId, origin: Origin) {
        let _ = self.events.send(ClientEvent::LedgerChanged {
            ledger: ledger.clone(),
            origin,
        });
        if origin == Origin::Local {
            let _ = self.local.send(LocalUpdate::Changed);
        }
    }

    fn on_set_item(&self, ledger: &LedgerId, item: &Transaction, origin: Origin) {
        let _ = self.events.send(ClientEvent::ItemSet {
            ledger: ledger.clone(),
            id: item.id.clone(),
            origin,
        });
        if origin == Origin::Local {
            let _ = self.local.send(LocalUpdate::Item(item.to_record()));
        }
    }
}

/// The sync engine for one ledger.
///
/// Starts connecting as soon as it is created. Never reconnects on its own:
/// after the channel reaches [`ChannelState::Done`] the owner decides when
/// to call [`SyncClient::reconnect`].
pub struct SyncClient<T: Transport + 'static> {
    ledger_id: LedgerId,
    ledger: Arc<Mutex<Ledger>>,
    transport: Arc<T>,
    state: watch::Receiver<ChannelState>,
    events: broadcast::Sender<ClientEvent>,
    commands: mpsc::UnboundedSender<Command>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
    observer: ObserverId,
}

impl<T: Transport + 'static> SyncClient<T> {
    /// Start syncing a ledger.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut ledger: Ledger, transport: T, device: DeviceId, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (local_tx, local_rx) = mpsc::unbounded_channel();
        let observer = ledger.subscribe(Arc::new(Forwarder {
            local: local_tx,
            events: events.clone(),
        }));

        let ledger_id = ledger.id().clone();
        let cipher = LedgerCipher::from_key(ledger.key());
        let channel = ChannelId::for_ledger(&ledger_id);
        let relay_address = ledger.relay_address().to_string();
        let ledger = Arc::new(Mutex::new(ledger));
        let transport = Arc::new(transport);
        let (state_tx, state_rx) = watch::channel(ChannelState::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            ledger_id: ledger_id.clone(),
            ledger: ledger.clone(),
            transport: transport.clone(),
            cipher,
            channel,
            device,
            relay_address,
            config,
            state: state_tx,
            events: events.clone(),
            local: local_rx,
            commands: command_rx,
            next_broadcast: None,
        };
        let task = tokio::spawn(driver.run());

        Self {
            ledger_id,
            ledger,
            transport,
            state: state_rx,
            events,
            commands: command_tx,
            task: std::sync::Mutex::new(Some(task)),
            observer,
        }
    }

    /// The ledger being synced.
    pub fn ledger_id(&self) -> &LedgerId {
        &self.ledger_id
    }

    /// Shared handle on the ledger.
    pub fn ledger(&self) -> &Arc<Mutex<Ledger>> {
        &self.ledger
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Wait until the channel reaches `target`.
    pub async fn wait_for_state(&self, target: ChannelState) -> Result<(), ClientError> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Closed)
    }

    /// Receive [`ClientEvent`]s from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Reconnect a closed channel.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        let state = self.state();
        if !state.is_done() {
            return Err(ClientError::InvalidState(state));
        }
        self.send(Command::Reconnect)
    }

    /// Close the channel. The session can be reconnected later.
    pub fn close(&self) -> Result<(), ClientError> {
        self.send(Command::Close)
    }

    /// Close the channel and stop the driver task for good.
    pub async fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(task) = task else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = task.await {
            tracing::error!("Sync driver for {} failed: {}", self.ledger_id, e);
        }
        self.ledger.lock().await.unsubscribe(self.observer);
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }

    /// Apply a local metadata edit; peers learn about it right away.
    pub async fn update_ledger(&self, edit: LedgerEdit) -> Result<bool, ClientError> {
        Ok(self.ledger.lock().await.update_local(edit)?)
    }

    /// A fresh transaction seeded with the ledger's defaults.
    pub async fn new_transaction(&self) -> Transaction {
        self.ledger.lock().await.new_transaction()
    }

    /// Store a locally created or edited transaction and publish it.
    pub async fn add_transaction(&self, item: Transaction) -> Result<Transaction, ClientError> {
        Ok(self.ledger.lock().await.set_item(item, Origin::Local)?)
    }

    /// Edit a stored transaction and publish it if anything changed.
    pub async fn update_transaction(
        &self,
        id: &TransactionId,
        edit: TransactionEdit,
    ) -> Result<Transaction, ClientError> {
        let mut ledger = self.ledger.lock().await;
        let mut item = ledger
            .get_item(id)?
            .ok_or_else(|| ClientError::ItemNotFound(id.clone()))?;
        if !item.update(edit)? {
            return Ok(item);
        }
        Ok(ledger.set_item(item, Origin::Local)?)
    }

    /// Every readable transaction, in display order.
    pub async fn items(&self) -> Result<Vec<Transaction>, ClientError> {
        Ok(self.ledger.lock().await.get_items()?)
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Owns the channel: runs the state machine, the broadcast timer and the
/// transport on a single task.
struct Driver<T: Transport> {
    ledger_id: LedgerId,
    ledger: Arc<Mutex<Ledger>>,
    transport: Arc<T>,
    cipher: LedgerCipher,
    channel: ChannelId,
    device: DeviceId,
    relay_address: String,
    config: SyncConfig,
    state: watch::Sender<ChannelState>,
    events: broadcast::Sender<ClientEvent>,
    local: mpsc::UnboundedReceiver<LocalUpdate>,
    commands: mpsc::UnboundedReceiver<Command>,
    next_broadcast: Option<Instant>,
}

impl<T: Transport + 'static> Driver<T> {
    async fn run(mut self) {
        let follow_ups = self.execute_all(vec![Action::Connect]).await;
        for event in follow_ups {
            self.dispatch(event).await;
        }

        loop {
            let current = *self.state.borrow();
            let live = matches!(current, ChannelState::Open | ChannelState::Connected);
            let deadline = self.next_broadcast;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => self.dispatch(Event::ReconnectRequested).await,
                    Some(Command::Close) => self.dispatch(Event::CloseRequested).await,
                    Some(Command::Shutdown) | None => {
                        self.dispatch(Event::CloseRequested).await;
                        break;
                    }
                },
                Some(update) = self.local.recv() => self.on_local(update).await,
                received = self.transport.recv(), if live => match received {
                    Ok(payload) => self.on_payload(&payload).await,
                    Err(e) => {
                        tracing::warn!("Ledger {} lost its connection: {}", self.ledger_id, e);
                        self.dispatch(Event::TransportClosed).await;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.next_broadcast = None;
                    self.dispatch(Event::BroadcastDue).await;
                }
            }
        }
        tracing::debug!("Sync driver for {} stopped", self.ledger_id);
    }

    // ===========================================
    // State machine
    // ===========================================

    async fn dispatch(&mut self, event: Event) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let actions = self.transition(event);
            pending.extend(self.execute_all(actions).await);
        }
    }

    fn transition(&mut self, event: Event) -> Vec<Action> {
        let current = *self.state.borrow();
        let (next, actions) = current.on_event(event);
        if next != current {
            tracing::info!("Ledger {}: {} -> {} on {:?}", self.ledger_id, current, next, event);
            self.state.send_replace(next);
            let _ = self.events.send(ClientEvent::StateChanged(next));
        }
        actions
    }

    async fn execute_all(&mut self, actions: Vec<Action>) -> Vec<Event> {
        let mut follow_ups = Vec::new();
        for action in actions {
            if let Some(event) = self.execute(action).await {
                follow_ups.push(event);
            }
        }
        follow_ups
    }

    async fn execute(&mut self, action: Action) -> Option<Event> {
        match action {
            Action::Connect => match self.transport.connect(&self.relay_address).await {
                Ok(()) => Some(Event::TransportOpened),
                Err(e) => {
                    tracing::warn!("Ledger {} could not connect to {}: {}", self.ledger_id, self.relay_address, e);
                    Some(Event::ConnectFailed)
                }
            },
            Action::Subscribe => {
                let filter = self.config.topic(&self.channel, None);
                match self.transport.subscribe(&filter).await {
                    Ok(()) => Some(Event::Subscribed),
                    Err(e) => {
                        tracing::warn!("Ledger {} could not subscribe: {}", self.ledger_id, e);
                        Some(Event::SubscribeFailed)
                    }
                }
            }
            Action::Disconnect => {
                if let Err(e) = self.transport.close().await {
                    tracing::debug!("Ledger {} close failed: {}", self.ledger_id, e);
                }
                None
            }
            Action::SendHello => {
                let hello = Envelope::Hello {
                    device: self.device.clone(),
                };
                self.publish(&hello).await
            }
            Action::Broadcast => self.broadcast().await,
            Action::ScheduleBroadcast { delay } => {
                let at = match delay {
                    BroadcastDelay::Immediate => Instant::now(),
                    BroadcastDelay::Interval => Instant::now() + self.config.broadcast_interval,
                };
                self.next_broadcast = Some(at);
                None
            }
            Action::CancelBroadcast => {
                self.next_broadcast = None;
                None
            }
        }
    }

    // ===========================================
    // Outbound
    // ===========================================

    /// Publish full state: metadata first, then every transaction.
    async fn broadcast(&mut self) -> Option<Event> {
        let (metadata, bulk) = {
            let ledger = self.ledger.lock().await;
            let items = match ledger.get_items() {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!("Ledger {} broadcast skipped: {}", self.ledger_id, e);
                    return None;
                }
            };
            let metadata = Envelope::Broadcast {
                device: self.device.clone(),
                map: items.iter().map(|t| (t.id.clone(), t.last_modified())).collect(),
                name: ledger.name().clone(),
                description: ledger.description().clone(),
                participants: ledger.participant_entries(),
            };
            let bulk = Envelope::SendItems {
                device: self.device.clone(),
                items: items.iter().map(Transaction::to_record).collect(),
            };
            (metadata, bulk)
        };

        tracing::debug!("Ledger {} broadcasting", self.ledger_id);
        if let Some(event) = self.publish(&metadata).await {
            return Some(event);
        }
        self.publish(&bulk).await
    }

    /// Encrypt and publish an envelope. A transport failure closes the channel.
    async fn publish(&self, envelope: &Envelope) -> Option<Event> {
        match self.try_publish(envelope).await {
            Ok(()) => None,
            Err(ClientError::Transport(e)) => {
                tracing::warn!("Ledger {} publish failed: {}", self.ledger_id, e);
                Some(Event::TransportClosed)
            }
            Err(e) => {
                tracing::error!("Ledger {} could not encode {}: {}", self.ledger_id, envelope.tag(), e);
                None
            }
        }
    }

    async fn try_publish(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let plaintext = envelope.to_bytes()?;
        let payload = self.cipher.encrypt_message(&plaintext)?;
        let suffix = envelope.retained_topic();
        let topic = self.config.topic(&self.channel, suffix);
        self.transport.publish(&topic, &payload, suffix.is_some()).await?;
        tracing::trace!("Ledger {} published {} ({} bytes)", self.ledger_id, envelope.tag(), payload.len());
        Ok(())
    }

    async fn on_local(&mut self, update: LocalUpdate) {
        match update {
            LocalUpdate::Changed => self.dispatch(Event::LocalChange).await,
            LocalUpdate::Item(item) => {
                if !self.state.borrow().is_connected() {
                    // The next broadcast carries it.
                    return;
                }
                let envelope = Envelope::SetItem {
                    device: self.device.clone(),
                    item,
                };
                if let Some(event) = self.publish(&envelope).await {
                    self.dispatch(event).await;
                }
            }
        }
    }

    // ===========================================
    // Inbound
    // ===========================================

    async fn on_payload(&mut self, payload: &[u8]) {
        let plaintext = match self.cipher.decrypt_message(payload) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::debug!("Ledger {} dropped a payload: {}", self.ledger_id, e);
                return;
            }
        };
        let envelope = match Envelope::from_bytes(&plaintext) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Ledger {} dropped a malformed envelope: {}", self.ledger_id, e);
                return;
            }
        };
        if envelope.device() == &self.device {
            return;
        }
        tracing::debug!("Ledger {} received {} from {}", self.ledger_id, envelope.tag(), envelope.device());

        match envelope {
            Envelope::SetItem { item, .. } => self.merge_items(vec![item]).await,
            Envelope::SendItems { items, .. } => self.merge_items(items).await,
            Envelope::Broadcast {
                name,
                description,
                participants,
                ..
            } => {
                let mut ledger = self.ledger.lock().await;
                if let Err(e) = ledger.merge_remote(&name, &description, &participants) {
                    tracing::error!("Ledger {} metadata merge failed: {}", self.ledger_id, e);
                }
            }
            Envelope::Hello { .. } => self.dispatch(Event::HelloReceived).await,
            Envelope::GetItems { .. } => {}
        }
    }

    async fn merge_items(&self, items: Vec<TransactionRecord>) {
        let mut ledger = self.ledger.lock().await;
        for record in items {
            let id = record.id.clone();
            if let Err(e) = ledger.set_item(Transaction::from_record(record), Origin::Remote) {
                tracing::error!("Ledger {} could not store {}: {}", self.ledger_id, id, e);
            }
        }
    }
}
