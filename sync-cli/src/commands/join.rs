//! Join a ledger from an invite link.

use anyhow::{Context, Result};
use std::path::Path;

use ledger_sync_core::{load_or_create_device_id, Catalog, Invite, Ledger};

use super::open_store;

/// Run the join command. Returns the joined ledger's id.
pub async fn run(data_dir: &Path, link: &str) -> Result<String> {
    let invite = Invite::from_link(link).context("Invalid invite link")?;
    let store = open_store(data_dir)?;
    load_or_create_device_id(store.as_ref())?;

    if Catalog::new(store.clone()).list()?.contains(&invite.ledger_id) {
        println!("Already a member of ledger {}.", invite.ledger_id);
        return Ok(invite.ledger_id.to_string());
    }

    let ledger = Ledger::join(store, &invite)?;

    println!("Joined ledger {}!", ledger.id());
    println!();
    println!("  Relay: {}", ledger.relay_address());
    println!();
    println!("Name, participants and transactions arrive with the first sync.");

    Ok(ledger.id().to_string())
}
