//! # sync-core
//!
//! Synchronous domain logic for ledger-sync (no network I/O).
//!
//! This crate implements the ledger model, its merge rules and the channel
//! state machine:
//! - [`Transaction`] - one expense with independently versioned fields
//! - [`Ledger`] - the aggregate root: metadata, participants, item index,
//!   persistence and change notification
//! - [`Catalog`] - the ledgers known to a device, and garbage collection
//! - [`KeyValueStore`] - the storage a device needs
//! - [`LedgerKey`], [`Invite`] - ledger secrets and the join flow
//! - [`ChannelState`] - pure connection state machine
//!
//! ## Design Philosophy
//!
//! Merging is a per-field max over `(timestamp, content)`, so devices that
//! saw the same set of writes hold the same state regardless of delivery
//! order or duplication. The network side (encryption, transport, timers)
//! lives in `sync-client`, which interprets the actions produced by
//! [`ChannelState`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod balance;
pub mod catalog;
pub mod device;
pub mod error;
pub mod invite;
pub mod ledger;
pub mod state;
pub mod store;
pub mod transaction;

pub use balance::Balances;
pub use catalog::{Catalog, GcReport, CATALOG_KEY};
pub use device::{load_or_create_device_id, DEVICE_KEY};
pub use error::LedgerError;
pub use invite::{Invite, InviteError, LedgerKey, INVITE_VERSION, KEY_SIZE};
pub use ledger::{
    Ledger, LedgerEdit, LedgerObserver, NewLedger, ObserverId, DEFAULT_DESCRIPTION,
    DEFAULT_RELAY_ADDRESS, LEGACY_RELAY_ADDRESS,
};
pub use state::{Action, BroadcastDelay, ChannelState, Event};
pub use store::{get_json, set_json, KeyValueStore, MemoryStore, StorageError};
pub use transaction::{iso_date, Transaction, TransactionEdit, DEFAULT_CURRENCY};
