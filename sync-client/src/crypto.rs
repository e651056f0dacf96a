//! Cryptographic session for ledger-sync.
//!
//! This module provides:
//! - ChaCha20-Poly1305 authenticated encryption with 96-bit random nonces
//! - A self-delimiting wire format: `nonce (12 bytes) || ciphertext || tag`
//!
//! # Security Notes
//!
//! - Every message gets a fresh nonce from the OS random source
//! - The key is the ledger secret itself; it never leaves the device except
//!   inside an invite
//! - A payload that fails authentication is an expected event (another
//!   ledger's traffic, corruption in transit) and is dropped by the caller

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use ledger_sync_core::LedgerKey;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (tampered payload or wrong key).
    #[error("decryption failed: authentication error")]
    Authentication,

    /// Payload too short to hold a nonce and a tag.
    #[error("payload too short: {0} bytes")]
    PayloadTooShort(usize),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

/// Encrypts and decrypts envelopes for one ledger.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LedgerCipher {
    key: [u8; KEY_SIZE],
}

impl LedgerCipher {
    /// Import a raw secret.
    pub fn import_key(raw: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = raw.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: raw.len(),
        })?;
        Ok(Self { key })
    }

    /// Session for a ledger secret.
    pub fn from_key(key: &LedgerKey) -> Self {
        Self { key: *key.as_bytes() }
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    /// Encrypt a message.
    ///
    /// Returns `nonce || ciphertext || tag`, with a fresh random nonce.
    pub fn encrypt_message(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(format!("nonce generation: {}", e)))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed("aead encrypt failed".into()))?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(payload)
    }

    /// Decrypt a payload produced by [`LedgerCipher::encrypt_message`].
    pub fn decrypt_message(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if payload.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::PayloadTooShort(payload.len()));
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Authentication)
    }
}

// Don't leak keys in debug output
impl std::fmt::Debug for LedgerCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerCipher {{ key: [REDACTED] }}")
    }
}
