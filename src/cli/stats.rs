use anyhow::{Context, Result};

use ledger::config::LedgerConfig;
use ledger::db::Database;
use ledger::entries::types::EntryType;

/// Display ledger statistics in the terminal.
pub fn stats(config: &LedgerConfig, session: Option<&str>) -> Result<()> {
    let db = Database::from_config(config);
    let response = db
        .stats(session)
        .context("could not read statistics (see log for details)")?;

    println!("Ledger Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total entries:       {}", response.total_entries);
    println!("  Sessions:            {}", response.sessions);
    println!();

    println!("By Type:");
    for t in EntryType::ALL {
        let count = response.by_type.get(t.as_str()).copied().unwrap_or(0);
        if count > 0 {
            println!("  {:<22} {}", t.label(), count);
        }
    }
    println!();

    println!("By Importance:");
    for i in ["high", "medium", "low"] {
        let count = response.by_importance.get(i).copied().unwrap_or(0);
        println!("  {:<22} {}", i, count);
    }
    println!();

    println!("Database size:         {} bytes", response.db_size_bytes);
    if let Some(ref oldest) = response.oldest_entry {
        println!("Oldest entry:          {oldest}");
    }
    if let Some(ref newest) = response.newest_entry {
        println!("Newest entry:          {newest}");
    }

    Ok(())
}
