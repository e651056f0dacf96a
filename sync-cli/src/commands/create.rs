//! Create a new ledger.

use anyhow::Result;
use std::path::Path;

use ledger_sync_core::{load_or_create_device_id, Ledger, NewLedger};

use super::{open_store, parse_participant};
use crate::config::CliConfig;

/// Run the create command. Returns the new ledger's id.
pub async fn run(
    data_dir: &Path,
    config: &CliConfig,
    name: &str,
    description: Option<&str>,
    participants: &[String],
) -> Result<String> {
    let store = open_store(data_dir)?;
    load_or_create_device_id(store.as_ref())?;

    let participants = participants
        .iter()
        .map(|p| parse_participant(p))
        .collect::<Result<Vec<_>>>()?;

    let ledger = Ledger::create(
        store,
        NewLedger {
            relay_address: Some(config.ledger.relay_address.clone()),
            name: Some(name.to_string()),
            description: description.map(str::to_string),
            participants,
            ..Default::default()
        },
    )?;

    println!("Ledger created!");
    println!();
    println!("  ID:           {}", ledger.id());
    println!("  Name:         {}", ledger.name().content);
    println!("  Participants: {}", ledger.participants().len());
    println!("  Relay:        {}", ledger.relay_address());
    println!();
    println!("Share it with: ledger-sync invite {}", ledger.id());

    Ok(ledger.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::find_ledger;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_persists_ledger() {
        let dir = tempdir().unwrap();
        let participants = vec!["alice=Alice".to_string(), "bob".to_string()];
        let id = run(dir.path(), &CliConfig::default(), "Trip", Some("Summer"), &participants)
            .await
            .unwrap();

        let store = open_store(dir.path()).unwrap();
        let ledger = find_ledger(&store, &id).unwrap();
        assert_eq!(ledger.name().content, "Trip");
        assert_eq!(ledger.description().content, "Summer");
        assert_eq!(ledger.participant_list().len(), 2);
    }

    #[tokio::test]
    async fn create_uses_configured_relay() {
        let dir = tempdir().unwrap();
        let mut config = CliConfig::default();
        config.ledger.relay_address = "wss://broker.example".into();
        let id = run(dir.path(), &config, "Flat", None, &[]).await.unwrap();

        let store = open_store(dir.path()).unwrap();
        assert_eq!(find_ledger(&store, &id).unwrap().relay_address(), "wss://broker.example");
    }

    #[tokio::test]
    async fn create_rejects_bad_participant() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), &CliConfig::default(), "Trip", None, &["=x".into()]).await;
        assert!(result.is_err());
    }
}
