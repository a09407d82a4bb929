//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use ledger::buffer::Buffer;
use ledger::config::LedgerConfig;
use ledger::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &LedgerConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It is created on the first flush.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Ledger Health Report");
    println!("====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!(
        "Schema version:    {} (binary expects {})",
        report.schema_version.as_deref().unwrap_or("(unset)"),
        db::migrations::CURRENT_SCHEMA_VERSION
    );
    println!();
    println!("Row counts:");
    println!("  Entries:         {}", report.entry_count);
    println!("  Sessions:        {}", report.session_count);
    println!();

    let buffer = Buffer::from_config(config);
    let sessions = buffer.list_sessions();
    let pending: Vec<&String> = sessions.iter().filter(|s| buffer.exists(s)).collect();
    let orphans: Vec<&String> = sessions.iter().filter(|s| buffer.flush_in_progress(s)).collect();
    println!("Buffers:");
    println!("  Session dirs:    {}", sessions.len());
    println!("  Unflushed:       {}", pending.len());
    println!("  Flushing/orphan: {}", orphans.len());
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }
    if report.fts_ok {
        println!("FTS index:         PASSED");
    } else {
        println!("FTS index:         FAILED");
    }

    if !report.integrity_ok {
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or move the file aside; buffers still on disk are flushed into a fresh database.");
    } else if !report.fts_ok {
        println!();
        println!("Rebuild the search index with:");
        println!("  sqlite3 {} \"INSERT INTO entries_fts(entries_fts) VALUES('rebuild')\"", db_path.display());
    }
    if !orphans.is_empty() {
        println!();
        println!("Run `ledger recover` to replay interrupted flushes.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
