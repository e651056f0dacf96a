//! # sync-client
//!
//! Sync engine for ledger-sync.
//!
//! This is the library applications use to keep ledgers converged across
//! devices.
//!
//! ## Features
//!
//! - **E2E Encryption**: ChaCha20-Poly1305 keyed by the ledger secret; the
//!   broker only relays ciphertext
//! - **Transport Abstraction**: Pluggable publish/subscribe layer (in-memory
//!   broker included)
//! - **Pure State Machine**: Uses sync-core for side-effect-free channel logic
//! - **Persistent Storage**: Directory-backed store for device records
//!
//! ## Example
//!
//! ```ignore
//! use ledger_sync_client::{FileStore, MemoryBroker, SyncClient, SyncConfig};
//! use ledger_sync_core::{load_or_create_device_id, Ledger, NewLedger};
//!
//! let store = Arc::new(FileStore::open("./data")?);
//! let device = load_or_create_device_id(store.as_ref())?;
//! let ledger = Ledger::create(store, NewLedger::default())?;
//!
//! let broker = MemoryBroker::new();
//! let client = SyncClient::start(ledger, broker.transport(), device, SyncConfig::default());
//! client.add_transaction(item).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod crypto;
pub mod registry;
pub mod store;
pub mod transport;

pub use client::{ClientError, ClientEvent, SyncClient};
pub use config::{SyncConfig, DEFAULT_BROADCAST_INTERVAL, DEFAULT_TOPIC_PREFIX};
pub use crypto::{CryptoError, LedgerCipher, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use registry::ClientRegistry;
pub use store::FileStore;
pub use transport::{MemoryBroker, MemoryTransport, Transport, TransportError};
