//! Ledger secrets and invites for joining a ledger from another device.
//!
//! This module provides:
//! - [`LedgerKey`], the 256-bit symmetric secret shared by a ledger's devices
//! - [`Invite`], everything a new device needs to join: identity, secret, broker
//! - Payload encoding (URL-safe base64 JSON) and `#/join/<payload>` links
//!
//! The join flow:
//! 1. Device A shares an invite for ledger L
//! 2. Device B decodes it and creates L locally with placeholder metadata
//! 3. B subscribes to L's channel and announces itself with `hello`
//! 4. A answers with a full broadcast, which overwrites B's placeholders

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};
use ledger_sync_types::LedgerId;

/// Size of a ledger secret in bytes.
pub const KEY_SIZE: usize = 32;

/// Current invite format version.
pub const INVITE_VERSION: u32 = 1;

/// Fragment prefix of join links.
pub const JOIN_LINK_PREFIX: &str = "#/join/";

/// Error type for invite and key decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteError {
    /// The invite payload is invalid (bad base64 or JSON).
    InvalidPayload(String),
    /// The key does not decode to [`KEY_SIZE`] bytes.
    InvalidKey(String),
    /// Version mismatch.
    UnsupportedVersion(u32),
}

impl std::fmt::Display for InviteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteError::InvalidPayload(msg) => write!(f, "invalid invite payload: {}", msg),
            InviteError::InvalidKey(msg) => write!(f, "invalid ledger key: {}", msg),
            InviteError::UnsupportedVersion(v) => write!(f, "unsupported invite version: {}", v),
        }
    }
}

impl std::error::Error for InviteError {}

/// A 32-byte symmetric secret shared by all devices of a ledger.
///
/// Never transmitted except inside an invite.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct LedgerKey([u8; KEY_SIZE]);

impl LedgerKey {
    /// Generate a new random key.
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Standard base64, the stored form.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode the stored form.
    pub fn from_base64(encoded: &str) -> Result<Self, InviteError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| InviteError::InvalidKey(format!("base64 decode: {}", e)))?;
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            InviteError::InvalidKey(format!("expected {} bytes, got {}", KEY_SIZE, b.len()))
        })?;
        Ok(Self(bytes))
    }
}

// Intentionally opaque debug to avoid logging secrets
impl std::fmt::Debug for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerKey([REDACTED])")
    }
}

impl Serialize for LedgerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for LedgerKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// An invite to join a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Invite format version.
    pub version: u32,
    /// The ledger to join.
    pub ledger_id: LedgerId,
    /// The ledger secret.
    pub key: LedgerKey,
    /// Broker the ledger's devices meet on.
    pub relay_address: String,
}

impl Invite {
    /// Create an invite for a ledger.
    pub fn new(ledger_id: LedgerId, key: LedgerKey, relay_address: impl Into<String>) -> Self {
        Self {
            version: INVITE_VERSION,
            ledger_id,
            key,
            relay_address: relay_address.into(),
        }
    }

    /// Encode the invite as a URL-safe base64 JSON payload.
    pub fn to_payload(&self) -> Result<String, InviteError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| InviteError::InvalidPayload(format!("json encode: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode an invite payload.
    pub fn from_payload(payload: &str) -> Result<Self, InviteError> {
        let json_bytes = URL_SAFE_NO_PAD
            .decode(payload.trim())
            .map_err(|e| InviteError::InvalidPayload(format!("base64 decode: {}", e)))?;

        let invite: Self = serde_json::from_slice(&json_bytes)
            .map_err(|e| InviteError::InvalidPayload(format!("json parse: {}", e)))?;

        if invite.version != INVITE_VERSION {
            return Err(InviteError::UnsupportedVersion(invite.version));
        }

        Ok(invite)
    }

    /// Encode as a `#/join/<payload>` link fragment.
    pub fn to_link(&self) -> Result<String, InviteError> {
        Ok(format!("{}{}", JOIN_LINK_PREFIX, self.to_payload()?))
    }

    /// Decode a join link, a full URL containing one, or a bare payload.
    pub fn from_link(link: &str) -> Result<Self, InviteError> {
        let payload = match link.find(JOIN_LINK_PREFIX) {
            Some(pos) => &link[pos + JOIN_LINK_PREFIX.len()..],
            None => link,
        };
        Self::from_payload(payload)
    }
}
