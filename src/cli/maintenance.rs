//! CLI `purge` command: retention sweeps over the shared database.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};

use ledger::buffer::Buffer;
use ledger::config::LedgerConfig;
use ledger::db::Database;

/// Delete a whole session (database rows and buffer), or every entry older
/// than `older_than_days`.
pub fn purge(config: &LedgerConfig, session: Option<&str>, older_than_days: Option<i64>) -> Result<()> {
    let db = Database::from_config(config);
    match (session, older_than_days) {
        (Some(session), None) => {
            let deleted = db.delete_session(session);
            let cleared = Buffer::from_config(config).clear(session);
            println!("Deleted {deleted} entries from session {session}.");
            if !cleared {
                println!("  Warning: the session buffer could not be cleared.");
            }
        }
        (None, Some(days)) => {
            if days < 0 {
                bail!("--older-than-days must not be negative");
            }
            let cutoff = Utc::now() - Duration::days(days);
            let deleted = db.purge_before(cutoff);
            println!("Deleted {deleted} entries created before {}.", cutoff.format("%Y-%m-%d %H:%M UTC"));
        }
        _ => bail!("pass exactly one of --session or --older-than-days"),
    }
    Ok(())
}
