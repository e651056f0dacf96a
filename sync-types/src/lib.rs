//! # sync-types
//!
//! Wire and storage formats for the ledger-sync shared expense ledger.
//!
//! This crate provides the foundational types used across all ledger-sync crates:
//! - [`Timestamp`], [`Versioned`] - The last-write-wins merge primitive
//! - [`LedgerId`], [`TransactionId`], [`ParticipantId`], [`DeviceId`], [`ChannelId`] - Identities
//! - [`LedgerRecord`], [`TransactionRecord`] - Persisted record shapes
//! - [`Envelope`] - Tagged messages exchanged between devices (before encryption)
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;
mod records;
mod versioned;

pub use envelope::{Envelope, ParticipantEntry};
pub use error::SyncError;
pub use ids::{ChannelId, DeviceId, LedgerId, Origin, ParticipantId, TransactionId};
pub use records::{EffectiveDate, LedgerRecord, TransactionRecord};
pub use versioned::{Timestamp, Versioned};
