//! Transport abstraction for ledger-sync.
//!
//! This module provides a pluggable, topic-addressed publish/subscribe
//! layer. The sync engine only needs:
//! - `connect()` to reach a broker
//! - `subscribe()` to a topic filter (one per ledger channel)
//! - `publish()` opaque bytes to a topic, optionally retained
//! - `recv()` the next message for the subscription
//! - `close()` to leave
//!
//! Brokers are not expected to filter out a client's own publications; the
//! sync engine discards them itself.
//!
//! # Example
//!
//! ```ignore
//! let broker = MemoryBroker::new();
//! let transport = broker.transport();
//! transport.connect("memory").await?;
//! transport.subscribe("ledgerapp/<channel>/").await?;
//! transport.publish("ledgerapp/<channel>/", &payload, false).await?;
//! let bytes = transport.recv().await?;
//! ```

mod memory;

pub use memory::{MemoryBroker, MemoryTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscription failed.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Transport trait for exchanging encrypted envelopes through a broker.
///
/// Implementations handle the underlying connection mechanism
/// (MQTT over WebSocket, in-memory, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the broker at the given address.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Subscribe to every topic starting with `filter`.
    ///
    /// Retained messages under the filter are delivered right away.
    async fn subscribe(&self, filter: &str) -> Result<(), TransportError>;

    /// Publish bytes to a topic. A retained message replaces the previous
    /// retained message of that topic.
    async fn publish(&self, topic: &str, data: &[u8], retain: bool) -> Result<(), TransportError>;

    /// Receive the next message.
    ///
    /// Waits until data is available or the connection closes. Must be
    /// cancel-safe: dropping the future loses no message.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}
