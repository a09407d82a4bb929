use anyhow::Result;
use std::path::Path;

use ledger::config::LedgerConfig;
use ledger::extraction::ExtractionOrchestrator;

use super::read_input;

/// Mine a transcript (file or stdin) for entries and store them.
pub async fn extract(config: &LedgerConfig, session: &str, input: Option<&Path>) -> Result<()> {
    let content = read_input(input)?;
    let orchestrator = ExtractionOrchestrator::from_config(config);
    let report = orchestrator.extract(session, &content).await;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
