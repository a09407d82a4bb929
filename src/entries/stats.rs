use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{EntryType, Importance};

/// Ledger-wide or per-session statistics.
#[derive(Debug, Serialize)]
pub struct LedgerStats {
    pub total_entries: u64,
    pub sessions: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_importance: BTreeMap<String, u64>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<String>,
}

/// Compute ledger statistics.
///
/// If `session` is provided, counts are restricted to that session.
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn ledger_stats(conn: &Connection, session: Option<&str>, db_path: Option<&Path>) -> Result<LedgerStats> {
    let (where_clause, param) = session_filter(session);

    let (total, sessions, oldest, newest): (i64, i64, Option<String>, Option<String>) = {
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT session_id), MIN(created_at), MAX(created_at) \
             FROM entries {where_clause}"
        );
        let map = |row: &rusqlite::Row<'_>| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?));
        match param {
            Some(s) => conn.query_row(&sql, params![s], map)?,
            None => conn.query_row(&sql, [], map)?,
        }
    };

    let mut by_type: BTreeMap<String, u64> = EntryType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();
    for (t, n) in grouped_counts(conn, "entry_type", session)? {
        by_type.insert(t, n);
    }

    let mut by_importance: BTreeMap<String, u64> = [Importance::High, Importance::Medium, Importance::Low]
        .iter()
        .map(|i| (i.as_str().to_string(), 0))
        .collect();
    for (i, n) in grouped_counts(conn, "importance", session)? {
        by_importance.insert(i, n);
    }

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(LedgerStats {
        total_entries: total as u64,
        sessions: sessions as u64,
        by_type,
        by_importance,
        db_size_bytes,
        oldest_entry: oldest,
        newest_entry: newest,
    })
}

/// `column` is one of our own column names, never user input.
fn grouped_counts(conn: &Connection, column: &str, session: Option<&str>) -> Result<Vec<(String, u64)>> {
    let (where_clause, param) = session_filter(session);
    let sql = format!("SELECT {column}, COUNT(*) FROM entries {where_clause} GROUP BY {column}");
    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64));
    let rows = match param {
        Some(s) => stmt.query_map(params![s], map)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

fn session_filter(session: Option<&str>) -> (&'static str, Option<&str>) {
    match session {
        Some(s) => ("WHERE session_id = ?1", Some(s)),
        None => ("", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::entries::store::insert_entry;
    use crate::entries::types::Entry;

    #[test]
    fn test_empty_db_stats() {
        let conn = open_memory_database().unwrap();
        let stats = ledger_stats(&conn, None, None).unwrap();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.by_type["decision"], 0);
        assert_eq!(stats.by_type.len(), EntryType::ALL.len());
        assert_eq!(stats.by_importance["high"], 0);
        assert!(stats.oldest_entry.is_none());
        assert!(stats.newest_entry.is_none());
    }

    #[test]
    fn test_stats_counts_by_type_and_importance() {
        let conn = open_memory_database().unwrap();
        insert_entry(&conn, "a", &Entry::new(EntryType::Decision, "one", Importance::High)).unwrap();
        insert_entry(&conn, "a", &Entry::new(EntryType::Decision, "two", Importance::Medium)).unwrap();
        insert_entry(&conn, "b", &Entry::new(EntryType::Learning, "three", Importance::High)).unwrap();

        let stats = ledger_stats(&conn, None, None).unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.by_type["decision"], 2);
        assert_eq!(stats.by_type["learning"], 1);
        assert_eq!(stats.by_importance["high"], 2);
        assert_eq!(stats.by_importance["low"], 0);
        assert!(stats.oldest_entry.is_some());
    }

    #[test]
    fn test_stats_session_filter() {
        let conn = open_memory_database().unwrap();
        insert_entry(&conn, "a", &Entry::new(EntryType::Decision, "one", Importance::High)).unwrap();
        insert_entry(&conn, "b", &Entry::new(EntryType::Learning, "two", Importance::Low)).unwrap();

        let stats = ledger_stats(&conn, Some("b"), None).unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.by_type["learning"], 1);
        assert_eq!(stats.by_type["decision"], 0);
    }
}
