//! Write path: hashing, dedup-on-insert, and deletion.
//!
//! Dedup is enforced by the unique index on `(session_id, entry_type,
//! content_hash)`; a conflicting insert is a silent no-op. The FTS index is
//! maintained by triggers, so no write here touches `entries_fts` directly.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::types::{format_timestamp, Entry};

const INSERT_SQL: &str = "INSERT INTO entries (session_id, entry_type, content, importance, source, \
     category, keywords, applies_when, source_file, metadata, content_hash, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
     ON CONFLICT(session_id, entry_type, content_hash) DO NOTHING";

/// Insert one entry. Returns `false` when an identical entry already exists.
///
/// Callers are expected to have validated the entry; this still refuses an
/// invalid one rather than relying on the CHECK constraints alone.
pub fn insert_entry(conn: &Connection, session_id: &str, entry: &Entry) -> Result<bool> {
    if session_id.is_empty() {
        bail!("empty session id");
    }
    entry.validate()?;

    let keywords = if entry.keywords.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&entry.keywords)?)
    };
    let metadata = if entry.metadata.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&entry.metadata)?)
    };

    let rows = conn.execute(
        INSERT_SQL,
        params![
            session_id,
            entry.entry_type.as_str(),
            entry.content,
            entry.importance.as_str(),
            entry.source.map(|s| s.as_str()),
            entry.category,
            keywords,
            entry.applies_when,
            entry.source_file,
            metadata,
            entry.content_hash(),
            format_timestamp(&entry.created_at),
        ],
    )?;
    Ok(rows == 1)
}

/// Insert a batch in one transaction. Invalid entries are skipped with a debug
/// log; duplicates are not counted.
pub fn insert_entries(conn: &mut Connection, session_id: &str, entries: &[Entry]) -> Result<usize> {
    if session_id.is_empty() {
        bail!("empty session id");
    }
    let tx = conn.transaction()?;
    let mut inserted = 0;
    for entry in entries {
        if let Err(e) = entry.validate() {
            tracing::debug!(session = session_id, error = %e, "skipping invalid entry");
            continue;
        }
        if insert_entry(&tx, session_id, entry)? {
            inserted += 1;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

/// Hard delete every entry of a session. The FTS rows go with them via trigger.
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<usize> {
    let rows = conn.execute("DELETE FROM entries WHERE session_id = ?1", params![session_id])?;
    Ok(rows)
}

/// Retention sweep: delete entries of any session created before `cutoff`.
pub fn purge_before(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<usize> {
    let rows = conn.execute(
        "DELETE FROM entries WHERE created_at < ?1",
        params![format_timestamp(cutoff)],
    )?;
    Ok(rows)
}
