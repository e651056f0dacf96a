//! List the ledgers on this device.

use anyhow::Result;
use std::path::Path;

use ledger_sync_core::Catalog;

use super::{open_store, short};

/// Run the list command. Returns the number of ledgers listed.
pub async fn run(data_dir: &Path) -> Result<usize> {
    let store = open_store(data_dir)?;
    let ledgers = Catalog::new(store).load_all()?;

    if ledgers.is_empty() {
        println!("No ledgers yet.");
        println!();
        println!("Run 'ledger-sync create <name>' or 'ledger-sync join <link>'.");
        return Ok(0);
    }

    for ledger in &ledgers {
        println!(
            "{}  {:<24} {:>3} participants {:>4} transactions",
            short(ledger.id().as_str()),
            ledger.name().content,
            ledger.participants().len(),
            ledger.items().len()
        );
    }
    Ok(ledgers.len())
}
