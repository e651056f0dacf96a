//! Garbage-collect the record store.

use anyhow::Result;
use std::path::Path;

use ledger_sync_core::{Catalog, GcReport};

use super::open_store;

/// Run the gc command.
pub async fn run(data_dir: &Path) -> Result<GcReport> {
    let store = open_store(data_dir)?;
    let report = Catalog::new(store).garbage_collect()?;

    println!("Garbage collection complete:");
    println!("  Ledgers kept:     {}", report.ledgers_kept);
    println!("  Ledgers dropped:  {}", report.ledgers_dropped);
    println!("  Items pruned:     {}", report.items_pruned);
    println!("  Records deleted:  {}", report.keys_deleted);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create;
    use crate::config::CliConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn gc_deletes_orphans_only() {
        let dir = tempdir().unwrap();
        create::run(dir.path(), &CliConfig::default(), "Trip", None, &[])
            .await
            .unwrap();
        let store = open_store(dir.path()).unwrap();
        store.set("orphan", b"{}").unwrap();

        let report = run(dir.path()).await.unwrap();
        assert_eq!(report.ledgers_kept, 1);
        assert_eq!(report.keys_deleted, 1);
        assert!(store.get("orphan").unwrap().is_none());
    }

    #[tokio::test]
    async fn gc_on_empty_device() {
        let dir = tempdir().unwrap();
        let report = run(dir.path()).await.unwrap();
        assert_eq!(report, GcReport::default());
    }
}
