//! SQL DDL for the ledger tables.
//!
//! Defines `entries`, the `entries_fts` (FTS5) external-content index with its
//! sync triggers, and `schema_meta`. All DDL uses `IF NOT EXISTS` so
//! initialization is idempotent and safe on databases from older releases.

use rusqlite::Connection;

/// Core tables and indexes.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    entry_type TEXT NOT NULL CHECK(entry_type IN (
        'file_read','file_edit','file_write','search','direction','preference',
        'constraint','learning','decision','discovery','guideline',
        'implementation_plan','reference')),
    content TEXT NOT NULL CHECK(length(trim(content)) > 0),
    importance TEXT NOT NULL DEFAULT 'medium' CHECK(importance IN ('high','medium','low')),
    source TEXT CHECK(source IS NULL OR source IN ('user','assistant')),
    category TEXT,
    keywords TEXT,
    applies_when TEXT,
    source_file TEXT,
    metadata TEXT,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Dedup happens here, not in application code
CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_dedup
    ON entries(session_id, entry_type, content_hash);
CREATE INDEX IF NOT EXISTS idx_entries_session
    ON entries(session_id, created_at);
CREATE INDEX IF NOT EXISTS idx_entries_session_type
    ON entries(session_id, entry_type, created_at);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Full-text index over `(content, entry_type)` and the triggers that keep it
/// in sync with `entries`. Also used by the 0.3.0 schema migration to rebuild
/// indexes created by older releases.
pub(crate) const FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
    content,
    entry_type,
    content='entries',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS entries_ai AFTER INSERT ON entries BEGIN
    INSERT INTO entries_fts(rowid, content, entry_type)
    VALUES (new.id, new.content, new.entry_type);
END;

CREATE TRIGGER IF NOT EXISTS entries_ad AFTER DELETE ON entries BEGIN
    INSERT INTO entries_fts(entries_fts, rowid, content, entry_type)
    VALUES ('delete', old.id, old.content, old.entry_type);
END;

CREATE TRIGGER IF NOT EXISTS entries_au AFTER UPDATE ON entries BEGIN
    INSERT INTO entries_fts(entries_fts, rowid, content, entry_type)
    VALUES ('delete', old.id, old.content, old.entry_type);
    INSERT INTO entries_fts(rowid, content, entry_type)
    VALUES (new.id, new.content, new.entry_type);
END;
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
///
/// Fresh databases are stamped with the oldest schema version and brought
/// current by [`super::migrations::run_migrations`].
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(FTS_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [crate::migrations::OLDEST_KNOWN_VERSION],
    )?;

    Ok(())
}
