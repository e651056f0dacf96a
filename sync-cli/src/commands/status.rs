//! Show device status.

use anyhow::Result;
use std::path::Path;

use ledger_sync_core::{get_json, Catalog, DEVICE_KEY};
use ledger_sync_types::DeviceId;

use super::{open_store, store_path};
use crate::config::{CliConfig, CONFIG_FILE};

/// Run the status command.
pub async fn run(data_dir: &Path, config: &CliConfig) -> Result<()> {
    println!("=== ledger-sync status ===");
    println!();

    let store = open_store(data_dir)?;
    println!("Device:");
    match get_json::<DeviceId>(store.as_ref(), DEVICE_KEY)? {
        Some(device) => println!("  ID:    {}", device),
        None => println!("  ID:    (assigned on first create or join)"),
    }
    println!("  Store: {}", store_path(data_dir).display());
    println!();

    let config_path = data_dir.join(CONFIG_FILE);
    println!("Configuration:");
    if config_path.exists() {
        println!("  File:      {}", config_path.display());
    } else {
        println!("  File:      (none, using defaults)");
    }
    println!("  Relay:     {}", config.ledger.relay_address);
    println!("  Currency:  {}", config.ledger.default_currency);
    println!("  Topics:    {}/...", config.sync.topic_prefix);
    println!();

    let ledgers = Catalog::new(store).list()?;
    println!("Ledgers: {}", ledgers.len());
    if ledgers.is_empty() {
        println!();
        println!("Run 'ledger-sync create <name>' or 'ledger-sync join <link>'.");
    }

    Ok(())
}
