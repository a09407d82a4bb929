//! FTS5 keyword search with BM25 ranking.

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;

use super::types::{EntryType, Importance, StoredEntry};
use super::{row_to_stored, ENTRY_COLUMNS};

/// Search knobs. Defaults: all sessions, no filters, prefix matching, 20 hits.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub session_id: Option<String>,
    pub entry_type: Option<EntryType>,
    pub importance: Option<Importance>,
    /// Append a trailing wildcard to plain tokens ("trail" matches "trailing").
    pub prefix_match: bool,
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            entry_type: None,
            importance: None,
            prefix_match: true,
            limit: 20,
        }
    }
}

/// A ranked search result. Higher `score` is more relevant.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub entry: StoredEntry,
    pub score: f64,
}

const OPERATORS: [&str; 4] = ["AND", "OR", "NOT", "NEAR"];
const COLUMNS: [&str; 2] = ["content", "entry_type"];

/// Turn free text into an FTS5 MATCH expression.
///
/// Plain tokens are double-quoted so punctuation cannot break the query
/// syntax. With `prefix_match`, each plain token also gets a trailing `*`.
/// FTS operators pass through, `column:term` is kept for the indexed
/// columns, and `-term` after a positive term becomes `NOT "term"`.
/// Anything else, `--force` or `http://x` included, is searched as text.
pub fn build_match_query(query: &str, prefix_match: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    for token in query.split_whitespace() {
        if OPERATORS.contains(&token) {
            parts.push(token.to_string());
            continue;
        }
        if let Some((column, value)) = token.split_once(':') {
            if COLUMNS.contains(&column) {
                if let Some(term) = quote_term(value, prefix_match) {
                    parts.push(format!("{column}:{term}"));
                }
                continue;
            }
        }
        if let Some(excluded) = token.strip_prefix('-') {
            // FTS5 NOT is binary: it needs a positive operand on its left.
            let has_left = parts.last().is_some_and(|p| !OPERATORS.contains(&p.as_str()));
            if has_left && !excluded.starts_with('-') {
                if let Some(term) = quote_term(excluded, false) {
                    parts.push(format!("NOT {term}"));
                }
                continue;
            }
        }
        if let Some(term) = quote_term(token, prefix_match) {
            parts.push(term);
        }
    }
    parts.join(" ")
}

/// `"term"` or `"term"*`; `None` when nothing searchable is left.
fn quote_term(token: &str, prefix_match: bool) -> Option<String> {
    let wildcard = token.ends_with('*');
    let clean = token.trim_end_matches('*').replace('"', "");
    if !clean.chars().any(char::is_alphanumeric) {
        return None;
    }
    if wildcard || prefix_match {
        Some(format!("\"{clean}\"*"))
    } else {
        Some(format!("\"{clean}\""))
    }
}

/// Ranked full-text search over `(content, entry_type)`.
pub fn search_entries(conn: &Connection, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
    let expr = build_match_query(query, options.prefix_match);
    if expr.is_empty() {
        return Ok(Vec::new());
    }

    let mut sql = format!(
        "SELECT {ENTRY_COLUMNS}, bm25(entries_fts) AS bm25_rank \
         FROM entries_fts JOIN entries e ON e.id = entries_fts.rowid \
         WHERE entries_fts MATCH ?1"
    );
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(expr)];

    if let Some(session_id) = &options.session_id {
        args.push(Box::new(session_id.clone()));
        sql.push_str(&format!(" AND e.session_id = ?{}", args.len()));
    }
    if let Some(entry_type) = options.entry_type {
        args.push(Box::new(entry_type.as_str()));
        sql.push_str(&format!(" AND e.entry_type = ?{}", args.len()));
    }
    if let Some(importance) = options.importance {
        args.push(Box::new(importance.as_str()));
        sql.push_str(&format!(" AND e.importance = ?{}", args.len()));
    }
    args.push(Box::new(options.limit as i64));
    sql.push_str(&format!(" ORDER BY bm25_rank, e.created_at DESC LIMIT ?{}", args.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let hits = stmt
        .query_map(params.as_slice(), |row| {
            let rank: f64 = row.get(13)?;
            Ok(SearchHit {
                entry: row_to_stored(row)?,
                // bm25() is negative, more negative = better
                score: -rank,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::entries::store::insert_entry;
    use crate::entries::types::Entry;

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        let entries = [
            Entry::new(EntryType::Learning, "Strip trailing whitespace in the formatter", Importance::Medium),
            Entry::new(EntryType::Decision, "Adopt trailing commas everywhere", Importance::High),
            Entry::new(EntryType::Learning, "Cargo workspaces share a lockfile", Importance::Low),
        ];
        for entry in &entries {
            insert_entry(&conn, "s1", entry).unwrap();
        }
        insert_entry(
            &conn,
            "s2",
            &Entry::new(EntryType::Learning, "trailing slash matters in rsync", Importance::Low),
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_build_match_query() {
        assert_eq!(build_match_query("trail", true), "\"trail\"*");
        assert_eq!(build_match_query("trail", false), "\"trail\"");
        assert_eq!(build_match_query("trail* bar", false), "\"trail\"* \"bar\"");
        assert_eq!(build_match_query("foo OR bar", true), "\"foo\"* OR \"bar\"*");
        assert_eq!(build_match_query("content:main", true), "content:\"main\"*");
        assert_eq!(build_match_query("fix -draft", false), "\"fix\" NOT \"draft\"");
        assert_eq!(build_match_query("-draft", false), "\"-draft\"");
        assert_eq!(build_match_query("--force", false), "\"--force\"");
        assert_eq!(build_match_query("a AND -b", false), "\"a\" AND \"-b\"");
        assert_eq!(build_match_query("http://x", false), "\"http://x\"");
        assert_eq!(build_match_query("say \"hi\"", false), "\"say\" \"hi\"");
        assert_eq!(build_match_query("  ", true), "");
        assert_eq!(build_match_query("\"\"", true), "");
    }

    #[test]
    fn test_prefix_match_finds_longer_words() {
        let conn = seeded();
        let options = SearchOptions::default();
        let hits = search_entries(&conn, "trail", &options).unwrap();
        assert_eq!(hits.len(), 3);

        let exact = SearchOptions {
            prefix_match: false,
            ..SearchOptions::default()
        };
        assert!(search_entries(&conn, "trail", &exact).unwrap().is_empty());
    }

    #[test]
    fn test_filters_apply_after_ranking() {
        let conn = seeded();
        let options = SearchOptions {
            session_id: Some("s1".into()),
            entry_type: Some(EntryType::Decision),
            ..SearchOptions::default()
        };
        let hits = search_entries(&conn, "trailing", &options).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.entry.content, "Adopt trailing commas everywhere");

        let low = SearchOptions {
            importance: Some(Importance::Low),
            ..SearchOptions::default()
        };
        let hits = search_entries(&conn, "trailing", &low).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.session_id, "s2");
    }

    #[test]
    fn test_entry_type_column_is_searchable() {
        let conn = seeded();
        let options = SearchOptions {
            prefix_match: false,
            ..SearchOptions::default()
        };
        let hits = search_entries(&conn, "entry_type:decision", &options).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_scores_rank_and_limit() {
        let conn = seeded();
        let options = SearchOptions {
            limit: 2,
            ..SearchOptions::default()
        };
        let hits = search_entries(&conn, "trailing", &options).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.score > 0.0));
    }

    #[test]
    fn test_dash_terms_exclude_or_match_literally() {
        let conn = seeded();
        let exact = SearchOptions {
            prefix_match: false,
            ..SearchOptions::default()
        };
        assert_eq!(search_entries(&conn, "trailing -rsync", &exact).unwrap().len(), 2);
        assert_eq!(search_entries(&conn, "-rsync", &exact).unwrap().len(), 1);
    }

    #[test]
    fn test_punctuation_does_not_break_query() {
        let conn = seeded();
        let hits = search_entries(&conn, "lockfile.", &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
