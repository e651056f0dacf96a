//! CLI command implementations.

pub mod add;
pub mod create;
pub mod gc;
pub mod invite;
pub mod join;
pub mod list;
pub mod remove;
pub mod show;
pub mod status;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ledger_sync_client::FileStore;
use ledger_sync_core::{Catalog, KeyValueStore, Ledger};
use ledger_sync_types::{LedgerId, ParticipantId};

/// Directory of the record store inside the data directory.
const STORE_DIR: &str = "store";

/// Path of the record store.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_DIR)
}

/// Open the record store of a data directory.
pub fn open_store(data_dir: &Path) -> Result<Arc<dyn KeyValueStore>> {
    let store = FileStore::open(store_path(data_dir))
        .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;
    Ok(Arc::new(store))
}

/// Load a ledger by identity, identity prefix or exact name.
pub fn find_ledger(store: &Arc<dyn KeyValueStore>, query: &str) -> Result<Ledger> {
    let ids = Catalog::new(store.clone()).list()?;
    let id = resolve_id(store, &ids, query)?;
    Ledger::load(store.clone(), &id).with_context(|| format!("Failed to load ledger {}", id))
}

fn resolve_id(store: &Arc<dyn KeyValueStore>, ids: &[LedgerId], query: &str) -> Result<LedgerId> {
    if let Some(id) = ids.iter().find(|id| id.as_str() == query) {
        return Ok(id.clone());
    }

    let by_prefix: Vec<&LedgerId> = ids.iter().filter(|id| id.as_str().starts_with(query)).collect();
    if by_prefix.len() == 1 {
        return Ok(by_prefix[0].clone());
    }

    let by_name: Vec<&LedgerId> = ids
        .iter()
        .filter(|id| {
            Ledger::load(store.clone(), id)
                .map(|ledger| ledger.name().content == query)
                .unwrap_or(false)
        })
        .collect();
    match (by_prefix.len(), by_name.len()) {
        (_, 1) => Ok(by_name[0].clone()),
        (0, 0) => anyhow::bail!("No ledger matches '{}'. Run 'ledger-sync list'.", query),
        _ => anyhow::bail!("'{}' matches several ledgers; use more of the id.", query),
    }
}

/// Parse a `id=Display Name` participant argument. A bare id is its own
/// display name.
pub fn parse_participant(arg: &str) -> Result<(ParticipantId, String)> {
    let (id, name) = match arg.split_once('=') {
        Some((id, name)) => (id.trim(), name.trim()),
        None => (arg.trim(), arg.trim()),
    };
    if id.is_empty() {
        anyhow::bail!("Participant '{}' has an empty id", arg);
    }
    Ok((ParticipantId::new(id), name.to_string()))
}

/// Shorten an identifier for display.
pub fn short(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_sync_core::NewLedger;
    use tempfile::tempdir;

    fn create(store: &Arc<dyn KeyValueStore>, id: &str, name: &str) {
        Ledger::create(
            store.clone(),
            NewLedger {
                id: Some(LedgerId::new(id)),
                name: Some(name.into()),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn find_by_id_prefix_and_name() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path()).unwrap();
        create(&store, "abc123", "Trip");
        create(&store, "abd456", "Flat");

        assert_eq!(find_ledger(&store, "abc123").unwrap().id().as_str(), "abc123");
        assert_eq!(find_ledger(&store, "abd").unwrap().id().as_str(), "abd456");
        assert_eq!(find_ledger(&store, "Trip").unwrap().id().as_str(), "abc123");
    }

    #[test]
    fn ambiguous_or_unknown_query_fails() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path()).unwrap();
        create(&store, "abc123", "Trip");
        create(&store, "abd456", "Flat");

        assert!(find_ledger(&store, "ab").is_err());
        assert!(find_ledger(&store, "zzz").is_err());
    }

    #[test]
    fn participant_arguments() {
        assert_eq!(
            parse_participant("alice=Alice Smith").unwrap(),
            (ParticipantId::new("alice"), "Alice Smith".to_string())
        );
        assert_eq!(
            parse_participant("bob").unwrap(),
            (ParticipantId::new("bob"), "bob".to_string())
        );
        assert!(parse_participant("=Nobody").is_err());
    }

    #[test]
    fn short_ids() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
    }
}
