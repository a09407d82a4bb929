mod helpers;

use helpers::learning;
use ledger::buffer::{Buffer, FLUSHING_FILE};
use ledger::db::{self, Database};
use ledger::entries::search::SearchOptions;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let conn = helpers::test_db();
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert!(report.fts_ok);
    assert_eq!(
        report.schema_version.as_deref(),
        Some(db::migrations::CURRENT_SCHEMA_VERSION)
    );
    assert_eq!(report.entry_count, 0);
    assert_eq!(report.session_count, 0);
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();
    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn wal_mode_is_enabled() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

/// A database path whose parent is a regular file can never be opened.
fn unreachable_db(tmp: &TempDir) -> Database {
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    Database::new(blocker.join("ledger.db"))
}

#[test]
fn unreachable_database_fails_soft() {
    let tmp = TempDir::new().unwrap();
    let db = unreachable_db(&tmp);

    assert!(!db.insert("s", &learning("lost")));
    assert_eq!(db.count_session("s"), 0);
    assert!(db.search("lost", &SearchOptions::default()).is_empty());
    assert!(db.query_tier1("s", 10).is_empty());
    assert!(db.stats(None).is_none());
    assert!(db.health().is_none());
}

#[test]
fn failed_flush_leaves_an_orphan_for_recovery() {
    let tmp = TempDir::new().unwrap();
    let buffer = Buffer::new(tmp.path().join("base"), unreachable_db(&tmp));
    buffer.append_many("s", &[learning("one"), learning("two")]);

    let result = buffer.flush_sync("s");
    assert!(!result.success);
    assert!(result.reason.is_some());
    assert!(buffer.flush_in_progress("s"));

    // Once the database is reachable again the orphan is replayed in full
    let healthy = Buffer::new(tmp.path().join("base"), Database::new(tmp.path().join("ledger.db")));
    let report = healthy.recover_all();
    assert_eq!(report.recovered, vec!["s".to_string()]);
    assert_eq!(report.entries_recovered, 2);
    assert_eq!(healthy.database().count_session("s"), 2);
    assert!(!tmp.path().join("base/sessions/s").join(FLUSHING_FILE).exists());
}

#[test]
fn corrupt_database_file_fails_soft() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ledger.db");
    std::fs::write(&path, vec![0x42u8; 8192]).unwrap();
    let db = Database::new(&path);

    assert!(!db.insert("s", &learning("x")));
    assert!(db.query_by_session("s", 10).is_empty());
    assert!(db.stats(Some("s")).is_none());
}
