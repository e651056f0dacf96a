//! Identity types for ledger-sync.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identity of a ledger. Opaque; random UUID v4 unless supplied by a join flow.
    ///
    /// Also used as the storage key of the ledger record.
    LedgerId
);

string_id!(
    /// Identity of a transaction, stable for the record's lifetime.
    ///
    /// Also used as the storage key of the transaction record.
    TransactionId
);

string_id!(
    /// Identity of a participant within a ledger.
    ParticipantId
);

string_id!(
    /// Stable per-process device identifier, used to drop self-published messages.
    DeviceId
);

impl LedgerId {
    /// Create a new random LedgerId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl TransactionId {
    /// Create a new random TransactionId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl DeviceId {
    /// Create a new random DeviceId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// The publish/subscribe channel of one ledger.
///
/// Derived from the ledger identity, never from the ledger secret: every
/// device that knows the identity lands on the same channel, and
/// confidentiality comes from encryption alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId([u8; 32]);

impl ChannelId {
    /// Derive the channel of a ledger.
    pub fn for_ledger(ledger: &LedgerId) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"ledger-sync-channel-v1");
        hasher.update(ledger.as_str().as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }

    /// Get the raw bytes of this ChannelId.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Topic string for this channel: `<prefix>/<channel>/<suffix>`.
    ///
    /// Without a suffix the topic ends with `/`, which is also the root
    /// that subscriptions match against.
    pub fn topic(&self, prefix: &str, suffix: Option<&str>) -> String {
        format!("{}/{}/{}", prefix, self, suffix.unwrap_or(""))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", &self.to_string()[..8])
    }
}

/// Where a change came from.
///
/// Local changes must be published; remote changes must not be re-published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Made on this device (e.g. by the user interface).
    Local,
    /// Received from another device over the network.
    Remote,
}
