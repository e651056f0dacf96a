//! Net balances per currency.

use std::collections::BTreeMap;

use ledger_sync_types::ParticipantId;

use crate::transaction::Transaction;

/// Net balance of every participant, per currency.
///
/// Positive means the participant is owed money. Within one currency the
/// balances sum to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    by_currency: BTreeMap<String, BTreeMap<ParticipantId, f64>>,
}

impl Balances {
    /// Compute balances over a set of transactions.
    ///
    /// The payer is credited the amount; each payee is debited its weighted
    /// share. Transactions whose weights sum to zero are skipped.
    pub fn compute(items: &[Transaction]) -> Self {
        let mut balances = Self::default();
        for item in items {
            let shares = item.shares();
            let total: f64 = shares.iter().map(|(_, w)| w).sum();
            if total <= 0.0 {
                continue;
            }
            let amount = item.amount.content;
            let ledger = balances
                .by_currency
                .entry(item.currency.content.clone())
                .or_default();
            *ledger.entry(item.paid_by.content.clone()).or_default() += amount;
            for (who, weight) in shares {
                *ledger.entry(who).or_default() -= amount * weight / total;
            }
        }
        balances
    }

    /// Currencies with at least one counted transaction.
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.by_currency.keys().map(String::as_str)
    }

    /// Balances in one currency.
    pub fn for_currency(&self, currency: &str) -> Option<&BTreeMap<ParticipantId, f64>> {
        self.by_currency.get(currency)
    }

    /// One participant's balance in one currency; zero when absent.
    pub fn get(&self, currency: &str, participant: &ParticipantId) -> f64 {
        self.for_currency(currency)
            .and_then(|b| b.get(participant))
            .copied()
            .unwrap_or(0.0)
    }

    /// True when no transaction was counted.
    pub fn is_empty(&self) -> bool {
        self.by_currency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionEdit;
    use ledger_sync_types::{Timestamp, TransactionId};

    fn expense(id: &str, amount: f64, currency: &str, by: &str, split: &[(&str, f64)]) -> Transaction {
        let mut t = Transaction::new(TransactionId::new(id), Timestamp::new(1));
        t.update_at(
            TransactionEdit {
                amount: Some(amount),
                currency: Some(currency.into()),
                paid_by: Some(by.into()),
                paid_for: Some(split.iter().map(|(p, _)| ParticipantId::new(*p)).collect()),
                weights: Some(split.iter().map(|(_, w)| *w).collect()),
                ..Default::default()
            },
            Timestamp::new(10),
        )
        .unwrap();
        t
    }

    fn alice() -> ParticipantId {
        ParticipantId::new("alice")
    }

    fn bob() -> ParticipantId {
        ParticipantId::new("bob")
    }

    #[test]
    fn equal_split() {
        let b = Balances::compute(&[expense("t1", 10.0, "EUR", "alice", &[("alice", 1.0), ("bob", 1.0)])]);
        assert_eq!(b.get("EUR", &alice()), 5.0);
        assert_eq!(b.get("EUR", &bob()), -5.0);
    }

    #[test]
    fn weighted_split_sums_to_zero() {
        let b = Balances::compute(&[
            expense("t1", 30.0, "EUR", "bob", &[("alice", 2.0), ("bob", 1.0)]),
            expense("t2", 7.5, "EUR", "alice", &[("bob", 1.0)]),
        ]);
        assert_eq!(b.get("EUR", &alice()), 7.5 - 20.0);
        assert_eq!(b.get("EUR", &bob()), 30.0 - 10.0 - 7.5);
        let total: f64 = b.for_currency("EUR").unwrap().values().sum();
        assert!(total.abs() < 1e-9);
    }

    #[test]
    fn currencies_are_kept_apart() {
        let b = Balances::compute(&[
            expense("t1", 10.0, "EUR", "alice", &[("bob", 1.0)]),
            expense("t2", 4.0, "USD", "bob", &[("alice", 1.0)]),
        ]);
        assert_eq!(b.currencies().collect::<Vec<_>>(), vec!["EUR", "USD"]);
        assert_eq!(b.get("USD", &alice()), -4.0);
        assert_eq!(b.get("EUR", &alice()), 10.0);
    }

    #[test]
    fn zero_weights_are_skipped() {
        let b = Balances::compute(&[expense("t1", 10.0, "EUR", "alice", &[("bob", 0.0)])]);
        assert!(b.is_empty());
    }
}
