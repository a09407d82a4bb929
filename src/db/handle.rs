//! The fail-soft database handle used by the buffer, restoration and
//! extraction layers.
//!
//! Every public method opens its own connection, runs the storage-level
//! operation from [`crate::entries`], and converts any error into an empty
//! result plus a `warn!` log. Hook processes must never crash the host tool
//! because the database is locked, missing or corrupt.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{check_database_health, open_database, HealthReport};
use crate::config::LedgerConfig;
use crate::entries::query::{self, QueryFilter, Tier1, Tier2};
use crate::entries::search::{search_entries, SearchHit, SearchOptions};
use crate::entries::stats::{ledger_stats, LedgerStats};
use crate::entries::store;
use crate::entries::types::{is_valid_session_id, Entry, EntryType, Importance, StoredEntry};

/// Handle to the shared ledger database file.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.resolved_db_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection with schema and migrations applied.
    pub fn open(&self) -> Result<Connection> {
        open_database(&self.path)
    }

    fn with_conn<T>(&self, op: &'static str, default: T, f: impl FnOnce(&mut Connection) -> Result<T>) -> T {
        match self.open().and_then(|mut conn| f(&mut conn)) {
            Ok(value) => value,
            Err(e) => {
                warn!(op, path = %self.path.display(), error = %format!("{e:#}"), "database operation failed");
                default
            }
        }
    }

    /// Store one entry. `false` for duplicates, invalid input, or errors.
    pub fn insert(&self, session_id: &str, entry: &Entry) -> bool {
        if !is_valid_session_id(session_id) || !entry.is_valid() {
            return false;
        }
        self.with_conn("insert", false, |conn| store::insert_entry(conn, session_id, entry))
    }

    /// Store a batch in one transaction. Returns the number of new rows.
    pub fn insert_many(&self, session_id: &str, entries: &[Entry]) -> usize {
        if !is_valid_session_id(session_id) || entries.is_empty() {
            return 0;
        }
        self.with_conn("insert_many", 0, |conn| store::insert_entries(conn, session_id, entries))
    }

    /// Like [`Database::insert_many`] but reports failure, so a flush can
    /// tell "nothing new" apart from "nothing written".
    pub fn try_insert_many(&self, session_id: &str, entries: &[Entry]) -> Result<usize> {
        if !is_valid_session_id(session_id) {
            bail!("invalid session id {session_id:?}");
        }
        let mut conn = self.open()?;
        store::insert_entries(&mut conn, session_id, entries)
    }

    pub fn delete_session(&self, session_id: &str) -> usize {
        if !is_valid_session_id(session_id) {
            return 0;
        }
        self.with_conn("delete_session", 0, |conn| store::delete_session(conn, session_id))
    }

    /// Delete entries of every session created before `cutoff`.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> usize {
        self.with_conn("purge_before", 0, |conn| store::purge_before(conn, &cutoff))
    }

    pub fn query_by_session(&self, session_id: &str, limit: usize) -> Vec<StoredEntry> {
        if !is_valid_session_id(session_id) {
            return Vec::new();
        }
        self.with_conn("query_by_session", Vec::new(), |conn| {
            query::query_by_session(conn, session_id, limit)
        })
    }

    pub fn query_by_type(&self, session_id: &str, entry_type: EntryType, limit: usize) -> Vec<StoredEntry> {
        if !is_valid_session_id(session_id) {
            return Vec::new();
        }
        self.with_conn("query_by_type", Vec::new(), |conn| {
            query::query_by_type(conn, session_id, entry_type, limit)
        })
    }

    pub fn query_by_importance(&self, session_id: &str, importance: Importance, limit: usize) -> Vec<StoredEntry> {
        if !is_valid_session_id(session_id) {
            return Vec::new();
        }
        self.with_conn("query_by_importance", Vec::new(), |conn| {
            query::query_by_importance(conn, session_id, importance, limit)
        })
    }

    /// Entries created within the last `hours` hours.
    pub fn query_recent(&self, session_id: &str, hours: i64, limit: usize) -> Vec<StoredEntry> {
        let filter = QueryFilter::default().since(Utc::now() - Duration::hours(hours));
        self.query_recent_filtered(session_id, &filter, limit)
    }

    pub fn query_recent_filtered(&self, session_id: &str, filter: &QueryFilter, limit: usize) -> Vec<StoredEntry> {
        if !is_valid_session_id(session_id) {
            return Vec::new();
        }
        self.with_conn("query_recent_filtered", Vec::new(), |conn| {
            query::select_entries(conn, session_id, filter, Some(limit))
        })
    }

    pub fn count_session(&self, session_id: &str) -> usize {
        if !is_valid_session_id(session_id) {
            return 0;
        }
        self.with_conn("count_session", 0, |conn| query::count_session(conn, session_id))
    }

    /// Ranked full-text search. A session filter with an invalid id matches nothing.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        if let Some(session_id) = options.session_id.as_deref() {
            if !is_valid_session_id(session_id) {
                return Vec::new();
            }
        }
        self.with_conn("search", Vec::new(), |conn| search_entries(conn, query, options))
    }

    pub fn query_tier1(&self, session_id: &str, decisions_limit: usize) -> Tier1 {
        if !is_valid_session_id(session_id) {
            return Tier1::default();
        }
        self.with_conn("query_tier1", Tier1::default(), |conn| {
            query::query_tier1(conn, session_id, decisions_limit)
        })
    }

    pub fn query_tier2(
        &self,
        session_id: &str,
        learnings_limit: usize,
        file_edits_limit: usize,
        decisions_limit: usize,
    ) -> Tier2 {
        if !is_valid_session_id(session_id) {
            return Tier2::default();
        }
        self.with_conn("query_tier2", Tier2::default(), |conn| {
            query::query_tier2(conn, session_id, learnings_limit, file_edits_limit, decisions_limit)
        })
    }

    pub fn stats(&self, session_id: Option<&str>) -> Option<LedgerStats> {
        self.with_conn("stats", None, |conn| {
            ledger_stats(conn, session_id, Some(self.path.as_path())).map(Some)
        })
    }

    pub fn health(&self) -> Option<HealthReport> {
        self.with_conn("health", None, |conn| check_database_health(conn).map(Some))
    }
}
