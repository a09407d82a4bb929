use anyhow::Result;
use serde_json::json;

use ledger::buffer::Buffer;
use ledger::config::LedgerConfig;
use ledger::status::StatusPayload;

use super::read_input;

/// Read a status payload from stdin and start a background flush once
/// context usage crosses the threshold.
pub fn status(config: &LedgerConfig, threshold: Option<f64>) -> Result<()> {
    let payload = StatusPayload::parse(&read_input(None)?)?;
    let threshold = threshold.unwrap_or(config.buffer.auto_flush_percent);

    let flush = if payload.should_flush(threshold) {
        let buffer = Buffer::from_config(config);
        Some(buffer.flush_async(payload.session_id()))
    } else {
        None
    };

    let out = json!({
        "session_id": payload.session_id(),
        "context_percent": payload.context_percent(),
        "threshold": threshold,
        "flush": flush,
    });
    println!("{out}");
    Ok(())
}
