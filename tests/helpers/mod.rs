#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use ledger::buffer::Buffer;
use ledger::db::{self, Database};
use ledger::entries::types::{Entry, EntryType, Importance};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// A temp base dir with a buffer and a database inside it. The directory
/// lives as long as the struct.
pub struct TestLedger {
    pub tmp: TempDir,
    pub buffer: Buffer,
    pub db: Database,
}

impl TestLedger {
    pub fn base_dir(&self) -> PathBuf {
        self.tmp.path().to_path_buf()
    }

    pub fn session_dir(&self, session: &str) -> PathBuf {
        self.tmp.path().join("sessions").join(session)
    }
}

pub fn test_ledger() -> TestLedger {
    let tmp = TempDir::new().unwrap();
    let db = Database::new(tmp.path().join("ledger.db"));
    let buffer = Buffer::new(tmp.path(), db.clone());
    TestLedger { tmp, buffer, db }
}

pub fn entry(entry_type: EntryType, content: &str, importance: Importance) -> Entry {
    Entry::new(entry_type, content, importance)
}

pub fn learning(content: &str) -> Entry {
    Entry::new(EntryType::Learning, content, Importance::Medium)
}

/// Fixed reference time so ordering assertions do not depend on the clock.
pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn at_minute(entry: Entry, minute: i64) -> Entry {
    entry.with_created_at(base_time() + Duration::minutes(minute))
}
