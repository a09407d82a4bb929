//! CLI `flush` and `recover`: the entry points of the background flush process.

use anyhow::{bail, Result};

use ledger::buffer::Buffer;
use ledger::config::LedgerConfig;

/// Flush one session, in this process or in a detached child.
pub fn flush(config: &LedgerConfig, session: &str, background: bool) -> Result<()> {
    let buffer = Buffer::from_config(config);
    let result = if background {
        buffer.flush_async(session)
    } else {
        buffer.flush_sync(session)
    };
    println!("{}", serde_json::to_string(&result)?);

    // A concurrent flush will pick our entries up; not a failure.
    if !result.success && !result.is_conflict() {
        bail!(
            "flush failed: {}",
            result.reason.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Replay orphaned flushing files, for one session or all of them.
pub fn recover(config: &LedgerConfig, session: Option<&str>) -> Result<()> {
    let buffer = Buffer::from_config(config);
    match session {
        Some(session) => {
            let result = buffer.recover(session);
            println!("{}", serde_json::to_string(&result)?);
        }
        None => {
            let report = buffer.recover_all();
            println!("{}", serde_json::to_string(&report)?);
            if !report.failed.is_empty() {
                tracing::warn!(sessions = ?report.failed, "some sessions could not be recovered");
            }
        }
    }
    Ok(())
}
