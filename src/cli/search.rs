use anyhow::Result;

use ledger::config::LedgerConfig;
use ledger::db::Database;
use ledger::entries::search::SearchOptions;

use super::preview;

/// Run a keyword search from the terminal.
pub fn search(config: &LedgerConfig, query: &str, options: &SearchOptions, json: bool) -> Result<()> {
    let db = Database::from_config(config);
    let hits = db.search(query, options);

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let entry = &hit.entry.entry;
        println!(
            "  {}. [{}/{}] session {} (score: {:.4})",
            i + 1,
            entry.entry_type,
            entry.importance.as_str(),
            hit.entry.session_id,
            hit.score,
        );
        println!("     {}", preview(&entry.content, 120));
        println!();
    }

    Ok(())
}
