//! Remove a ledger from this device.

use anyhow::Result;
use std::path::Path;

use ledger_sync_core::Catalog;

use super::{find_ledger, open_store};

/// Run the remove command. Records are deleted by the next `gc`, or right
/// away with `collect`.
pub async fn run(data_dir: &Path, ledger: &str, collect: bool) -> Result<()> {
    let store = open_store(data_dir)?;
    let ledger = find_ledger(&store, ledger)?;
    let catalog = Catalog::new(store);

    catalog.remove(ledger.id())?;
    println!("Removed ledger '{}' ({}).", ledger.name().content, ledger.id());

    if collect {
        let report = catalog.garbage_collect()?;
        println!("Deleted {} stored records.", report.keys_deleted);
    } else {
        println!("Run 'ledger-sync gc' to delete its records.");
    }
    Ok(())
}
