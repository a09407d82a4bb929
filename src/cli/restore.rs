use anyhow::Result;

use ledger::buffer::Buffer;
use ledger::config::LedgerConfig;
use ledger::restore::RestorationEngine;

/// Print the restored context for a session after recovering any orphaned flush.
pub fn restore(config: &LedgerConfig, session: &str, json: bool) -> Result<()> {
    // Session start is the moment an interrupted flush gets replayed.
    let recovered = Buffer::from_config(config).recover(session);
    if recovered.entries_flushed > 0 {
        tracing::info!(session, entries = recovered.entries_flushed, "recovered orphaned flush");
    }

    let engine = RestorationEngine::from_config(config);
    let payload = engine.restore(session);
    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", payload.to_markdown());
    }
    Ok(())
}
