//! Read path: newest-first listings and the tiered restoration queries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;

use super::types::{format_timestamp, EntryType, Importance, StoredEntry};
use super::{row_to_stored, ENTRY_COLUMNS};

/// Equality/range predicates for [`select_entries`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub entry_types: Vec<EntryType>,
    pub importance: Option<Importance>,
    pub since: Option<DateTime<Utc>>,
}

impl QueryFilter {
    pub fn of_type(entry_type: EntryType) -> Self {
        Self {
            entry_types: vec![entry_type],
            ..Self::default()
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

/// Always-restore band.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Tier1 {
    pub guidelines: Vec<StoredEntry>,
    pub implementation_plans: Vec<StoredEntry>,
    /// Most recent high-importance decisions.
    pub decisions: Vec<StoredEntry>,
}

/// Bounded best-effort band.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Tier2 {
    pub learnings: Vec<StoredEntry>,
    pub file_edits: Vec<StoredEntry>,
    /// Most recent medium-importance decisions.
    pub decisions: Vec<StoredEntry>,
}

impl Tier1 {
    pub fn len(&self) -> usize {
        self.guidelines.len() + self.implementation_plans.len() + self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Tier2 {
    pub fn len(&self) -> usize {
        self.learnings.len() + self.file_edits.len() + self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Newest-first entries of a session matching `filter`. `None` means no limit.
pub fn select_entries(
    conn: &Connection,
    session_id: &str,
    filter: &QueryFilter,
    limit: Option<usize>,
) -> Result<Vec<StoredEntry>> {
    let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.session_id = ?1");
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(session_id.to_string())];

    if !filter.entry_types.is_empty() {
        let start = args.len() + 1;
        let placeholders: Vec<String> = (start..start + filter.entry_types.len())
            .map(|i| format!("?{i}"))
            .collect();
        sql.push_str(&format!(" AND e.entry_type IN ({})", placeholders.join(", ")));
        for t in &filter.entry_types {
            args.push(Box::new(t.as_str()));
        }
    }
    if let Some(importance) = filter.importance {
        args.push(Box::new(importance.as_str()));
        sql.push_str(&format!(" AND e.importance = ?{}", args.len()));
    }
    if let Some(since) = filter.since {
        args.push(Box::new(format_timestamp(&since)));
        sql.push_str(&format!(" AND e.created_at >= ?{}", args.len()));
    }

    sql.push_str(" ORDER BY e.created_at DESC, e.id DESC");
    if let Some(limit) = limit {
        args.push(Box::new(limit as i64));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let rows = stmt
        .query_map(params.as_slice(), row_to_stored)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn query_by_session(conn: &Connection, session_id: &str, limit: usize) -> Result<Vec<StoredEntry>> {
    select_entries(conn, session_id, &QueryFilter::default(), Some(limit))
}

pub fn query_by_type(
    conn: &Connection,
    session_id: &str,
    entry_type: EntryType,
    limit: usize,
) -> Result<Vec<StoredEntry>> {
    select_entries(conn, session_id, &QueryFilter::of_type(entry_type), Some(limit))
}

pub fn query_by_importance(
    conn: &Connection,
    session_id: &str,
    importance: Importance,
    limit: usize,
) -> Result<Vec<StoredEntry>> {
    let filter = QueryFilter::default().with_importance(importance);
    select_entries(conn, session_id, &filter, Some(limit))
}

pub fn count_session(conn: &Connection, session_id: &str) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE session_id = ?1",
        [session_id],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

/// All guidelines, all implementation plans, and the `decisions_limit` most
/// recent high-importance decisions.
pub fn query_tier1(conn: &Connection, session_id: &str, decisions_limit: usize) -> Result<Tier1> {
    Ok(Tier1 {
        guidelines: select_entries(conn, session_id, &QueryFilter::of_type(EntryType::Guideline), None)?,
        implementation_plans: select_entries(
            conn,
            session_id,
            &QueryFilter::of_type(EntryType::ImplementationPlan),
            None,
        )?,
        decisions: select_entries(
            conn,
            session_id,
            &QueryFilter::of_type(EntryType::Decision).with_importance(Importance::High),
            Some(decisions_limit),
        )?,
    })
}

/// Each category gets its own limit so that a burst of file edits cannot
/// push learnings or decisions out of the payload.
pub fn query_tier2(
    conn: &Connection,
    session_id: &str,
    learnings_limit: usize,
    file_edits_limit: usize,
    decisions_limit: usize,
) -> Result<Tier2> {
    Ok(Tier2 {
        learnings: select_entries(
            conn,
            session_id,
            &QueryFilter::of_type(EntryType::Learning),
            Some(learnings_limit),
        )?,
        file_edits: select_entries(
            conn,
            session_id,
            &QueryFilter::of_type(EntryType::FileEdit),
            Some(file_edits_limit),
        )?,
        decisions: select_entries(
            conn,
            session_id,
            &QueryFilter::of_type(EntryType::Decision).with_importance(Importance::Medium),
            Some(decisions_limit),
        )?,
    })
}
