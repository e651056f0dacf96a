//! Record a transaction.

use anyhow::{Context, Result};
use std::path::Path;

use ledger_sync_core::TransactionEdit;
use ledger_sync_types::{Origin, ParticipantId, Timestamp};

use super::{find_ledger, open_store};
use crate::config::CliConfig;

/// Arguments of the add command.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    /// What the money was spent on.
    pub description: String,
    /// Amount paid.
    pub amount: f64,
    /// Currency; the configured default when absent.
    pub currency: Option<String>,
    /// Who paid.
    pub paid_by: String,
    /// Who it was for; every participant when empty.
    pub paid_for: Vec<String>,
    /// Weights parallel to `paid_for`; all 1 when empty.
    pub weights: Vec<f64>,
    /// Effective date `YYYY-MM-DD`; today when absent.
    pub date: Option<String>,
}

/// Run the add command. Returns the new transaction's id.
pub async fn run(data_dir: &Path, config: &CliConfig, ledger: &str, args: NewTransaction) -> Result<String> {
    let store = open_store(data_dir)?;
    let mut ledger = find_ledger(&store, ledger)?;

    let paid_by = ParticipantId::new(args.paid_by);
    if !ledger.participants().iter().any(|(p, _)| *p == paid_by) {
        anyhow::bail!("'{}' is not a participant of this ledger", paid_by);
    }

    let mut item = ledger.new_transaction_at(Timestamp::now(), &config.ledger.default_currency);
    let paid_for = if args.paid_for.is_empty() {
        None
    } else {
        Some(args.paid_for.into_iter().map(ParticipantId::new).collect::<Vec<_>>())
    };
    let weights = match (&paid_for, args.weights.is_empty()) {
        (_, false) => Some(args.weights),
        (Some(payees), true) => Some(vec![1.0; payees.len()]),
        (None, true) => None,
    };
    item.update(TransactionEdit {
        description: Some(args.description),
        amount: Some(args.amount),
        currency: args.currency,
        paid_by: Some(paid_by),
        paid_for,
        weights,
        effective_date: args.date,
    })
    .context("Invalid transaction")?;

    let stored = ledger.set_item(item, Origin::Local)?;
    println!(
        "Added {} {:.2} {} ({}).",
        stored.description.content, stored.amount.content, stored.currency.content, stored.id
    );
    Ok(stored.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create;
    use ledger_sync_types::TransactionId;
    use tempfile::tempdir;

    async fn trip(dir: &Path) -> String {
        create::run(dir, &CliConfig::default(), "Trip", None, &["alice".into(), "bob".into()])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_defaults_to_everyone() {
        let dir = tempdir().unwrap();
        let id = trip(dir.path()).await;
        let tx = run(
            dir.path(),
            &CliConfig::default(),
            &id,
            NewTransaction {
                description: "Fuel".into(),
                amount: 40.0,
                paid_by: "alice".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let store = open_store(dir.path()).unwrap();
        let ledger = find_ledger(&store, &id).unwrap();
        let item = ledger.get_item(&TransactionId::new(tx)).unwrap().unwrap();
        assert_eq!(item.currency.content, "EUR");
        assert_eq!(item.paid_for.content.len(), 2);
        assert_eq!(ledger.balances().unwrap().get("EUR", &ParticipantId::new("alice")), 20.0);
    }

    #[tokio::test]
    async fn add_uses_configured_currency_and_weights() {
        let dir = tempdir().unwrap();
        let id = trip(dir.path()).await;
        let mut config = CliConfig::default();
        config.ledger.default_currency = "CHF".into();
        let tx = run(
            dir.path(),
            &config,
            &id,
            NewTransaction {
                description: "Room".into(),
                amount: 90.0,
                paid_by: "bob".into(),
                paid_for: vec!["alice".into(), "bob".into()],
                weights: vec![2.0, 1.0],
                date: Some("2024-03-01".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let store = open_store(dir.path()).unwrap();
        let ledger = find_ledger(&store, &id).unwrap();
        let item = ledger.get_item(&TransactionId::new(tx)).unwrap().unwrap();
        assert_eq!(item.currency.content, "CHF");
        assert_eq!(item.effective_date.content, "2024-03-01");
        assert_eq!(ledger.balances().unwrap().get("CHF", &ParticipantId::new("alice")), -60.0);
    }

    #[tokio::test]
    async fn add_rejects_invalid_input() {
        let dir = tempdir().unwrap();
        let id = trip(dir.path()).await;
        let config = CliConfig::default();

        let stranger = NewTransaction {
            description: "?".into(),
            amount: 1.0,
            paid_by: "mallory".into(),
            ..Default::default()
        };
        assert!(run(dir.path(), &config, &id, stranger).await.is_err());

        let mismatched = NewTransaction {
            description: "?".into(),
            amount: 1.0,
            paid_by: "alice".into(),
            paid_for: vec!["alice".into()],
            weights: vec![1.0, 1.0],
            ..Default::default()
        };
        assert!(run(dir.path(), &config, &id, mismatched).await.is_err());

        let bad_date = NewTransaction {
            description: "?".into(),
            amount: 1.0,
            paid_by: "alice".into(),
            date: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(run(dir.path(), &config, &id, bad_date).await.is_err());
    }
}
