pub mod handle;
pub mod migrations;
pub mod schema;

pub use handle::Database;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Open (or create) the ledger database at the given path with the schema
/// initialized and migrated.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // Set before anything that may contend with a concurrent flusher
    conn.busy_timeout(Duration::from_millis(5000))?;
    // WAL lets hook processes read while another one is flushing
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::debug!(path = %path.display(), "database opened");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    /// Whether the full-text index matches the `entries` table.
    pub fts_ok: bool,
    pub schema_version: Option<String>,
    pub entry_count: u64,
    pub session_count: u64,
}

/// Run SQLite and FTS5 integrity checks and collect row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let integrity_ok = integrity_details == "ok";

    // FTS5 reports a mismatch as an SQL error rather than a row
    let fts_ok = conn
        .execute(
            "INSERT INTO entries_fts(entries_fts, rank) VALUES ('integrity-check', 1)",
            [],
        )
        .is_ok();

    let schema_version = migrations::get_schema_version(conn)?;
    let entry_count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    let session_count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT session_id) FROM entries",
        [],
        |row| row.get(0),
    )?;

    Ok(HealthReport {
        integrity_ok,
        integrity_details,
        fts_ok,
        schema_version,
        entry_count: entry_count as u64,
        session_count: session_count as u64,
    })
}
