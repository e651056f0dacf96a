//! Transaction - one expense, every field independently versioned.
//!
//! Local edits go through [`Transaction::update_at`], which stamps only the
//! fields whose value changed. Remote copies go through
//! [`Transaction::merge_with`], which resolves each field on its own, so a
//! single merge can keep some fields and take others.

use chrono::{DateTime, NaiveDate, Utc};
use ledger_sync_types::{
    EffectiveDate, ParticipantId, Timestamp, TransactionId, TransactionRecord, Versioned,
};

use crate::error::LedgerError;

/// Currency of freshly created transactions.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Format of effective dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single expense.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Stable identity.
    pub id: TransactionId,
    /// What the money was spent on.
    pub description: Versioned<String>,
    /// Amount paid. Always finite.
    pub amount: Versioned<f64>,
    /// Currency code.
    pub currency: Versioned<String>,
    /// Who paid.
    pub paid_by: Versioned<ParticipantId>,
    /// Who the payment was for.
    pub paid_for: Versioned<Vec<ParticipantId>>,
    /// Share weight of each payee.
    pub weights: Versioned<Vec<f64>>,
    /// Date the expense applies to, `YYYY-MM-DD`.
    pub effective_date: Versioned<String>,
    /// Creation time. Set once.
    pub created: Timestamp,
    modified: Timestamp,
}

/// A local edit. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionEdit {
    /// New description.
    pub description: Option<String>,
    /// New amount.
    pub amount: Option<f64>,
    /// New currency.
    pub currency: Option<String>,
    /// New payer.
    pub paid_by: Option<ParticipantId>,
    /// New payees.
    pub paid_for: Option<Vec<ParticipantId>>,
    /// New weights, parallel to the payees.
    pub weights: Option<Vec<f64>>,
    /// New effective date, `YYYY-MM-DD`.
    pub effective_date: Option<String>,
}

/// `YYYY-MM-DD` (UTC) of a timestamp.
pub fn iso_date(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts.value())
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

fn normalize_currency(currency: &mut Versioned<String>) {
    let code = match currency.content.as_str() {
        "€" => "EUR",
        "$" => "USD",
        _ => return,
    };
    currency.content = code.to_string();
}

impl Transaction {
    /// A transaction with every field a timestamp-zero placeholder.
    pub fn new(id: TransactionId, created: Timestamp) -> Self {
        Self {
            id,
            description: Versioned::placeholder(String::new()),
            amount: Versioned::placeholder(0.0),
            currency: Versioned::placeholder(DEFAULT_CURRENCY.to_string()),
            paid_by: Versioned::placeholder(ParticipantId::new("")),
            paid_for: Versioned::placeholder(Vec::new()),
            weights: Versioned::placeholder(Vec::new()),
            effective_date: Versioned::new(iso_date(created), created),
            created,
            modified: Timestamp::zero(),
        }
    }

    /// Build from a stored or received record.
    ///
    /// Non-finite amounts become zero, legacy numeric dates are upgraded to
    /// ISO strings stamped with that same time, and legacy currency symbols
    /// are replaced by their codes.
    pub fn from_record(record: TransactionRecord) -> Self {
        let mut amount = record.amount;
        if !amount.content.is_finite() {
            amount.content = 0.0;
        }
        let mut currency = record.currency;
        normalize_currency(&mut currency);
        let effective_date = match record.effective_ts {
            EffectiveDate::Versioned(date) => date,
            EffectiveDate::Legacy(ts) => Versioned::new(iso_date(ts), ts),
        };
        Self {
            id: record.id,
            description: record.description,
            amount,
            currency,
            paid_by: record.paid_by,
            paid_for: record.paid_for,
            weights: record.weights,
            effective_date,
            created: record.created_ts,
            modified: record.last_modified,
        }
    }

    /// The record stored locally and sent to peers.
    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id.clone(),
            description: self.description.clone(),
            amount: self.amount.clone(),
            currency: self.currency.clone(),
            paid_by: self.paid_by.clone(),
            paid_for: self.paid_for.clone(),
            weights: self.weights.clone(),
            last_modified: self.modified,
            created_ts: self.created,
            effective_ts: EffectiveDate::Versioned(self.effective_date.clone()),
        }
    }

    /// Time of the latest write to any field.
    ///
    /// Never lags a field timestamp, even after a merge raised one.
    pub fn last_modified(&self) -> Timestamp {
        [
            self.modified,
            self.description.timestamp,
            self.amount.timestamp,
            self.currency.timestamp,
            self.paid_by.timestamp,
            self.paid_for.timestamp,
            self.weights.timestamp,
            self.effective_date.timestamp,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }

    /// Apply a local edit now.
    pub fn update(&mut self, edit: TransactionEdit) -> Result<bool, LedgerError> {
        self.update_at(edit, Timestamp::now())
    }

    /// Apply a local edit at `now`.
    ///
    /// Validates the edit first; on error nothing changes. Returns whether
    /// any field changed.
    pub fn update_at(&mut self, edit: TransactionEdit, now: Timestamp) -> Result<bool, LedgerError> {
        self.validate(&edit)?;

        let mut changed = false;
        if let Some(description) = edit.description {
            changed |= self.description.set(description, now);
        }
        if let Some(amount) = edit.amount {
            changed |= self.amount.set(amount, now);
        }
        if let Some(currency) = edit.currency {
            changed |= self.currency.set(currency, now);
        }
        if let Some(paid_by) = edit.paid_by {
            changed |= self.paid_by.set(paid_by, now);
        }
        if let Some(paid_for) = edit.paid_for {
            changed |= self.paid_for.set(paid_for, now);
        }
        if let Some(weights) = edit.weights {
            changed |= self.weights.set(weights, now);
        }
        if let Some(date) = edit.effective_date {
            changed |= self.effective_date.set(date, now);
        }

        if changed {
            self.modified = self.last_modified().max(now);
        }
        Ok(changed)
    }

    fn validate(&self, edit: &TransactionEdit) -> Result<(), LedgerError> {
        if let Some(amount) = edit.amount {
            if !amount.is_finite() {
                return Err(LedgerError::InvalidData(format!(
                    "amount must be finite, got {}",
                    amount
                )));
            }
        }
        if edit.paid_for.is_none() && edit.weights.is_none() {
            return self.validate_date(edit);
        }
        let payees = edit.paid_for.as_ref().unwrap_or(&self.paid_for.content);
        let weights = edit.weights.as_ref().unwrap_or(&self.weights.content);
        if payees.len() != weights.len() {
            return Err(LedgerError::InvalidData(format!(
                "{} payees but {} weights",
                payees.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LedgerError::InvalidData(
                "weights must be finite and non-negative".into(),
            ));
        }
        self.validate_date(edit)
    }

    fn validate_date(&self, edit: &TransactionEdit) -> Result<(), LedgerError> {
        if let Some(date) = &edit.effective_date {
            NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|e| {
                LedgerError::InvalidData(format!("invalid date {:?}: {}", date, e))
            })?;
        }
        Ok(())
    }

    /// Merge another copy of this transaction into `self`, field by field.
    ///
    /// Returns whether anything changed. Copies of a different transaction
    /// are ignored.
    pub fn merge_with(&mut self, incoming: &Transaction) -> bool {
        if incoming.id != self.id {
            tracing::warn!("Refusing to merge {} into {}", incoming.id, self.id);
            return false;
        }
        let mut changed = false;
        changed |= self.description.merge(&incoming.description);
        changed |= self.amount.merge(&incoming.amount);
        changed |= self.currency.merge(&incoming.currency);
        changed |= self.paid_by.merge(&incoming.paid_by);
        changed |= self.paid_for.merge(&incoming.paid_for);
        changed |= self.weights.merge(&incoming.weights);
        changed |= self.effective_date.merge(&incoming.effective_date);
        if incoming.modified > self.modified {
            self.modified = incoming.modified;
            changed = true;
        }
        changed
    }

    /// Payees paired with their weights.
    ///
    /// After a merge the two lists may come from different edits; a missing
    /// weight counts as 1 and surplus weights are ignored.
    pub fn shares(&self) -> Vec<(ParticipantId, f64)> {
        self.paid_for
            .content
            .iter()
            .enumerate()
            .map(|(i, who)| {
                let weight = self.weights.content.get(i).copied().unwrap_or(1.0);
                (who.clone(), weight)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::new(millis)
    }

    fn dinner() -> Transaction {
        let mut t = Transaction::new(TransactionId::new("t1"), ts(100));
        t.update_at(
            TransactionEdit {
                description: Some("Dinner".into()),
                amount: Some(10.0),
                currency: Some("EUR".into()),
                paid_by: Some("alice".into()),
                paid_for: Some(vec!["alice".into(), "bob".into()]),
                weights: Some(vec![1.0, 1.0]),
                effective_date: None,
            },
            ts(1_000),
        )
        .unwrap();
        t
    }

    // ===========================================
    // Local updates
    // ===========================================

    #[test]
    fn update_stamps_only_changed_fields() {
        let mut t = dinner();
        let changed = t
            .update_at(
                TransactionEdit {
                    amount: Some(20.0),
                    currency: Some("EUR".into()),
                    ..Default::default()
                },
                ts(2_000),
            )
            .unwrap();

        assert!(changed);
        assert_eq!(t.amount, Versioned::new(20.0, ts(2_000)));
        assert_eq!(t.currency.timestamp, ts(1_000));
        assert_eq!(t.last_modified(), ts(2_000));
    }

    #[test]
    fn update_without_change_is_noop() {
        let mut t = dinner();
        let before = t.clone();
        let changed = t
            .update_at(
                TransactionEdit {
                    amount: Some(10.0),
                    ..Default::default()
                },
                ts(5_000),
            )
            .unwrap();
        assert!(!changed);
        assert_eq!(t, before);
    }

    #[test]
    fn update_rejects_mismatched_weights() {
        let mut t = dinner();
        let before = t.clone();
        let result = t.update_at(
            TransactionEdit {
                amount: Some(3.0),
                weights: Some(vec![1.0]),
                ..Default::default()
            },
            ts(2_000),
        );
        assert!(matches!(result, Err(LedgerError::InvalidData(_))));
        assert_eq!(t, before);
    }

    #[test]
    fn update_rejects_nan_and_bad_dates() {
        let mut t = dinner();
        assert!(t
            .update_at(
                TransactionEdit {
                    amount: Some(f64::NAN),
                    ..Default::default()
                },
                ts(2_000)
            )
            .is_err());
        assert!(t
            .update_at(
                TransactionEdit {
                    effective_date: Some("03/01/2024".into()),
                    ..Default::default()
                },
                ts(2_000)
            )
            .is_err());
    }

    #[test]
    fn update_with_regressed_clock_still_advances() {
        let mut t = dinner();
        t.update_at(
            TransactionEdit {
                amount: Some(11.0),
                ..Default::default()
            },
            ts(500),
        )
        .unwrap();
        assert_eq!(t.amount.timestamp, ts(1_001));
    }

    // ===========================================
    // Merge
    // ===========================================

    #[test]
    fn merge_with_copy_is_idempotent() {
        let mut t = dinner();
        let copy = t.clone();
        assert!(!t.merge_with(&copy));
        assert_eq!(t, copy);
    }

    #[test]
    fn merge_is_field_wise() {
        let base = dinner();

        let mut ours = base.clone();
        ours.update_at(
            TransactionEdit {
                description: Some("Dinner out".into()),
                ..Default::default()
            },
            ts(3_000),
        )
        .unwrap();

        let mut theirs = base;
        theirs
            .update_at(
                TransactionEdit {
                    amount: Some(20.0),
                    ..Default::default()
                },
                ts(2_000),
            )
            .unwrap();

        assert!(ours.merge_with(&theirs));
        assert_eq!(ours.description.content, "Dinner out");
        assert_eq!(ours.amount, Versioned::new(20.0, ts(2_000)));
        assert_eq!(ours.last_modified(), ts(3_000));
    }

    #[test]
    fn merge_converges_in_both_orders_even_on_ties() {
        let base = dinner();
        let mut a = base.clone();
        let mut b = base;
        // Same timestamp, different contents.
        a.update_at(
            TransactionEdit {
                description: Some("Lunch".into()),
                amount: Some(30.0),
                ..Default::default()
            },
            ts(4_000),
        )
        .unwrap();
        b.update_at(
            TransactionEdit {
                description: Some("Brunch".into()),
                currency: Some("USD".into()),
                ..Default::default()
            },
            ts(4_000),
        )
        .unwrap();

        let mut ab = a.clone();
        ab.merge_with(&b);
        ab.merge_with(&a);
        let mut ba = b.clone();
        ba.merge_with(&a);
        ba.merge_with(&b);

        assert_eq!(ab, ba);
        assert_eq!(ab.description.content, "Lunch");
        assert_eq!(ab.amount.content, 30.0);
        assert_eq!(ab.currency.content, "USD");
    }

    #[test]
    fn merge_ignores_other_ids() {
        let mut t = dinner();
        let mut other = dinner();
        other.id = TransactionId::new("t2");
        other
            .update_at(
                TransactionEdit {
                    amount: Some(99.0),
                    ..Default::default()
                },
                ts(9_000),
            )
            .unwrap();
        assert!(!t.merge_with(&other));
        assert_eq!(t.amount.content, 10.0);
    }

    #[test]
    fn last_modified_tracks_merged_fields() {
        let mut t = dinner();
        let mut newer = t.clone();
        newer.amount = Versioned::new(50.0, ts(7_000));
        t.merge_with(&newer);
        assert_eq!(t.last_modified(), ts(7_000));
    }

    // ===========================================
    // Records
    // ===========================================

    #[test]
    fn record_roundtrip() {
        let t = dinner();
        let restored = Transaction::from_record(t.to_record());
        assert_eq!(restored, t);
    }

    #[test]
    fn non_finite_amount_becomes_zero() {
        let mut record = dinner().to_record();
        record.amount = Versioned::new(f64::NAN, ts(10));
        let t = Transaction::from_record(record);
        assert_eq!(t.amount, Versioned::new(0.0, ts(10)));
    }

    #[test]
    fn legacy_date_is_upgraded() {
        let mut record = dinner().to_record();
        record.effective_ts = EffectiveDate::Legacy(ts(1_709_251_200_000));
        let t = Transaction::from_record(record);
        assert_eq!(
            t.effective_date,
            Versioned::new("2024-03-01".to_string(), ts(1_709_251_200_000))
        );
    }

    #[test]
    fn legacy_currency_symbols_are_normalized() {
        let mut record = dinner().to_record();
        record.currency = Versioned::new("€".to_string(), ts(42));
        let t = Transaction::from_record(record);
        assert_eq!(t.currency, Versioned::new("EUR".to_string(), ts(42)));
    }

    #[test]
    fn shares_tolerate_mismatched_lengths() {
        let mut t = dinner();
        t.weights = Versioned::new(vec![2.0], ts(5));
        assert_eq!(
            t.shares(),
            vec![(ParticipantId::new("alice"), 2.0), (ParticipantId::new("bob"), 1.0)]
        );
    }

    #[test]
    fn iso_date_formats_utc_day() {
        assert_eq!(iso_date(ts(0)), "1970-01-01");
        assert_eq!(iso_date(ts(1_709_251_200_000)), "2024-03-01");
    }
}
