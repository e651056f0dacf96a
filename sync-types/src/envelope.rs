//! Envelope - the plaintext of every message exchanged between devices.
//!
//! On the wire an envelope is UTF-8 JSON, encrypted and prefixed with its
//! nonce. The broker only ever sees the ciphertext.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, ParticipantId, Timestamp, TransactionId, TransactionRecord, SyncError, Versioned};

/// One participant entry of a `broadcast` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    /// Participant identity.
    pub value: ParticipantId,
    /// Versioned display name.
    pub text: Versioned<String>,
}

/// Messages exchanged between devices, tagged by `tag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "kebab-case")]
pub enum Envelope {
    /// A single transaction changed on the sender.
    SetItem {
        /// Sender device.
        device: DeviceId,
        /// The full transaction.
        item: TransactionRecord,
    },
    /// Full metadata push, sent periodically and on local change.
    Broadcast {
        /// Sender device.
        device: DeviceId,
        /// `[transaction id, last modified]` for every known transaction.
        map: Vec<(TransactionId, Timestamp)>,
        /// Ledger name.
        name: Versioned<String>,
        /// Ledger description.
        description: Versioned<String>,
        /// Participant roster.
        participants: Vec<ParticipantEntry>,
    },
    /// Every transaction the sender knows, sent right after a broadcast.
    SendItems {
        /// Sender device.
        device: DeviceId,
        /// The full transactions.
        items: Vec<TransactionRecord>,
    },
    /// Reserved: request for specific transactions. Accepted and ignored.
    GetItems {
        /// Sender device.
        device: DeviceId,
        /// Requested transactions.
        items: Vec<TransactionId>,
    },
    /// A device joined the channel; peers answer with a broadcast.
    Hello {
        /// Sender device.
        device: DeviceId,
    },
}

impl Envelope {
    /// Serialize to UTF-8 JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from UTF-8 JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::Deserialization)
    }

    /// The device that sent this envelope.
    pub fn device(&self) -> &DeviceId {
        match self {
            Envelope::SetItem { device, .. }
            | Envelope::Broadcast { device, .. }
            | Envelope::SendItems { device, .. }
            | Envelope::GetItems { device, .. }
            | Envelope::Hello { device } => device,
        }
    }

    /// The wire tag of this envelope.
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::SetItem { .. } => "set-item",
            Envelope::Broadcast { .. } => "broadcast",
            Envelope::SendItems { .. } => "send-items",
            Envelope::GetItems { .. } => "get-items",
            Envelope::Hello { .. } => "hello",
        }
    }

    /// Topic suffix for envelopes the broker should retain.
    ///
    /// Only full-state envelopes are retained, so a device subscribing later
    /// receives the latest state even when no peer is online.
    pub fn retained_topic(&self) -> Option<&'static str> {
        match self {
            Envelope::Broadcast { .. } | Envelope::SendItems { .. } => Some(self.tag()),
            _ => None,
        }
    }
}
