//! Show a ledger: metadata, transactions and balances.

use anyhow::Result;
use std::path::Path;

use ledger_sync_types::ChannelId;

use super::{find_ledger, open_store, short};
use crate::config::CliConfig;

/// Run the show command.
pub async fn run(data_dir: &Path, config: &CliConfig, ledger: &str) -> Result<()> {
    let store = open_store(data_dir)?;
    let ledger = find_ledger(&store, ledger)?;
    let topic = config
        .sync_config()
        .topic(&ChannelId::for_ledger(ledger.id()), None);

    println!("=== {} ===", ledger.name().content);
    println!("{}", ledger.description().content);
    println!();
    println!("  ID:      {}", ledger.id());
    println!("  Relay:   {}", ledger.relay_address());
    println!("  Channel: {} (synced by the app, not this CLI)", topic);
    if let Some(user) = ledger.user() {
        println!("  You:     {}", user);
    }
    println!();

    println!("Participants:");
    for (id, name) in ledger.participant_list() {
        println!("  {:<12} {}", id.as_str(), name);
    }
    println!();

    let items = ledger.get_items()?;
    println!("Transactions ({}):", items.len());
    for item in &items {
        let payees: Vec<&str> = item.paid_for.content.iter().map(|p| p.as_str()).collect();
        println!(
            "  {}  {}  {:>10.2} {:<4} {:<20} paid by {} for {}",
            short(item.id.as_str()),
            item.effective_date.content,
            item.amount.content,
            item.currency.content,
            item.description.content,
            item.paid_by.content,
            payees.join(", ")
        );
    }
    println!();

    let balances = ledger.balances()?;
    println!("Balances:");
    if balances.is_empty() {
        println!("  (none)");
    }
    for currency in balances.currencies() {
        if let Some(by_participant) = balances.for_currency(currency) {
            for (who, amount) in by_participant {
                println!("  {:<12} {:>10.2} {}", who.as_str(), amount, currency);
            }
        }
    }

    Ok(())
}
