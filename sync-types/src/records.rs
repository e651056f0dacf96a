//! Persisted record shapes.
//!
//! The same JSON shapes are stored locally (one record per key) and carried
//! inside envelopes, so a transaction read from disk can be published as is.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{LedgerId, ParticipantId, Timestamp, TransactionId, Versioned};

/// Stored form of a ledger, keyed by its [`LedgerId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// Broker address; absent in records written before it was configurable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_address: Option<String>,
    /// Ledger identity.
    pub id: LedgerId,
    /// Shared symmetric secret, standard base64.
    pub key: String,
    /// Ledger name.
    pub name: Versioned<String>,
    /// Ledger description.
    pub description: Versioned<String>,
    /// Participant display names, as `[id, name]` pairs.
    pub participants: Vec<(ParticipantId, Versioned<String>)>,
    /// Transaction index, in display order.
    pub items: Vec<TransactionId>,
    /// The participant this device acts as.
    #[serde(default)]
    pub user: Option<ParticipantId>,
}

/// Stored and transmitted form of a transaction, keyed by its [`TransactionId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction identity.
    pub id: TransactionId,
    /// What the money was spent on.
    pub description: Versioned<String>,
    /// Amount paid. `null` (a non-number written by older clients) decodes as NaN.
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: Versioned<f64>,
    /// Currency symbol or code.
    pub currency: Versioned<String>,
    /// Who paid.
    #[serde(rename = "paidBy")]
    pub paid_by: Versioned<ParticipantId>,
    /// Who the payment was for; parallel to `weights`.
    #[serde(rename = "paidFor")]
    pub paid_for: Versioned<Vec<ParticipantId>>,
    /// Share weight of each entry in `paid_for`.
    pub weights: Versioned<Vec<f64>>,
    /// Time of the last local edit.
    #[serde(default)]
    pub last_modified: Timestamp,
    /// Creation time; never changes.
    #[serde(default)]
    pub created_ts: Timestamp,
    /// Date the expense applies to.
    pub effective_ts: EffectiveDate,
}

/// The effective date of a transaction, in either storage generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectiveDate {
    /// Current shape: a versioned `YYYY-MM-DD` string.
    Versioned(Versioned<String>),
    /// Legacy shape: a bare epoch-milliseconds number.
    Legacy(Timestamp),
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Versioned<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Versioned::<Option<f64>>::deserialize(deserializer)?;
    Ok(Versioned::new(raw.content.unwrap_or(f64::NAN), raw.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSACTION_JSON: &str = r#"{
        "id": "t1",
        "description": {"content": "Dinner", "timestamp": 10},
        "amount": {"content": 42.5, "timestamp": 10},
        "currency": {"content": "EUR", "timestamp": 10},
        "paidBy": {"content": "alice", "timestamp": 10},
        "paidFor": {"content": ["alice", "bob"], "timestamp": 10},
        "weights": {"content": [1, 2], "timestamp": 10},
        "last_modified": 10,
        "created_ts": 5,
        "effective_ts": {"content": "2024-03-01", "timestamp": 10}
    }"#;

    #[test]
    fn transaction_record_field_names() {
        let record: TransactionRecord = serde_json::from_str(TRANSACTION_JSON).unwrap();
        assert_eq!(record.paid_by.content, ParticipantId::new("alice"));
        assert_eq!(record.weights.content, vec![1.0, 2.0]);
        assert_eq!(record.created_ts, Timestamp::new(5));

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("paidFor").is_some());
        assert!(value.get("last_modified").is_some());
    }

    #[test]
    fn legacy_numeric_effective_date_parses() {
        let json = TRANSACTION_JSON.replace(
            r#"{"content": "2024-03-01", "timestamp": 10}"#,
            "1709251200000",
        );
        let record: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(
            record.effective_ts,
            EffectiveDate::Legacy(Timestamp::new(1_709_251_200_000))
        );
    }

    #[test]
    fn null_amount_decodes_as_nan() {
        let json = TRANSACTION_JSON.replace("42.5", "null");
        let record: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert!(record.amount.content.is_nan());
    }

    #[test]
    fn missing_provenance_defaults_to_zero() {
        let json = TRANSACTION_JSON
            .replace(r#""last_modified": 10,"#, "")
            .replace(r#""created_ts": 5,"#, "");
        let record: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.last_modified, Timestamp::zero());
        assert_eq!(record.created_ts, Timestamp::zero());
    }

    #[test]
    fn ledger_record_uses_camel_case_and_pairs() {
        let json = r#"{
            "relayAddress": "wss://broker.example",
            "id": "l1",
            "key": "AAAA",
            "name": {"content": "Trip", "timestamp": 1},
            "description": {"content": "", "timestamp": 0},
            "participants": [["alice", {"content": "Alice", "timestamp": 1}]],
            "items": ["t1"],
            "user": null
        }"#;
        let record: LedgerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.relay_address.as_deref(), Some("wss://broker.example"));
        assert_eq!(record.participants[0].0, ParticipantId::new("alice"));
        assert_eq!(record.user, None);
    }

    #[test]
    fn ledger_record_without_relay_address() {
        let json = r#"{
            "id": "l1", "key": "AAAA",
            "name": {"content": "l1", "timestamp": 0},
            "description": {"content": "", "timestamp": 0},
            "participants": [], "items": []
        }"#;
        let record: LedgerRecord = serde_json::from_str(json).unwrap();
        assert!(record.relay_address.is_none());
        let out = serde_json::to_value(&record).unwrap();
        assert!(out.get("relayAddress").is_none());
    }
}
