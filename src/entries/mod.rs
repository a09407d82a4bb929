//! Storage-level operations on the `entries` table.
//!
//! Everything here takes a live [`rusqlite::Connection`] and propagates
//! errors; the fail-soft wrappers live on [`crate::db::Database`].

pub mod query;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

use types::{Entry, StoredEntry};

/// Column list matching [`row_to_stored`], for tables aliased as `e`.
pub(crate) const ENTRY_COLUMNS: &str = "e.id, e.session_id, e.entry_type, e.content, \
     e.importance, e.source, e.category, e.keywords, e.applies_when, e.source_file, \
     e.metadata, e.content_hash, e.created_at";

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Map a row selected with [`ENTRY_COLUMNS`].
pub(crate) fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredEntry> {
    let entry_type: String = row.get(2)?;
    let importance: String = row.get(4)?;
    let source: Option<String> = row.get(5)?;
    let keywords: Option<String> = row.get(7)?;
    let metadata: Option<String> = row.get(10)?;
    let created_at: String = row.get(12)?;

    let mut entry = Entry::new(
        entry_type.parse().map_err(|e| conversion_error(2, e))?,
        row.get::<_, String>(3)?,
        importance.parse().map_err(|e| conversion_error(4, e))?,
    );
    entry.source = source
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| conversion_error(5, e))?;
    entry.category = row.get(6)?;
    entry.keywords = keywords
        .and_then(|k| serde_json::from_str(&k).ok())
        .unwrap_or_default();
    entry.applies_when = row.get(8)?;
    entry.source_file = row.get(9)?;
    entry.metadata = metadata
        .and_then(|m| serde_json::from_str(&m).ok())
        .unwrap_or_default();
    entry.created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_error(12, e))?
        .with_timezone(&Utc);

    Ok(StoredEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        content_hash: row.get(11)?,
        entry,
    })
}
