//! Print the join link of a ledger.

use anyhow::Result;
use std::path::Path;

use super::{find_ledger, open_store};

/// Run the invite command. Returns the link.
pub async fn run(data_dir: &Path, ledger: &str) -> Result<String> {
    let store = open_store(data_dir)?;
    let ledger = find_ledger(&store, ledger)?;
    let link = ledger.invite().to_link()?;

    println!("Invite for '{}':", ledger.name().content);
    println!();
    println!("  {}", link);
    println!();
    println!("Anyone holding this link can read and edit the ledger.");
    println!("On the other device: ledger-sync join '<link>'");

    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create;
    use crate::config::CliConfig;
    use ledger_sync_core::Invite;
    use tempfile::tempdir;

    #[tokio::test]
    async fn invite_decodes_to_ledger() {
        let dir = tempdir().unwrap();
        let id = create::run(dir.path(), &CliConfig::default(), "Trip", None, &[])
            .await
            .unwrap();

        let link = run(dir.path(), &id).await.unwrap();
        assert!(link.starts_with("#/join/"));
        let invite = Invite::from_link(&link).unwrap();
        assert_eq!(invite.ledger_id.as_str(), id);
    }

    #[tokio::test]
    async fn invite_unknown_ledger_fails() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), "missing").await.is_err());
    }
}
