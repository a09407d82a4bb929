use ledger::db;
use rusqlite::Connection;
use tempfile::TempDir;

fn names(conn: &Connection, kind: &str) -> Vec<String> {
    conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
        .unwrap()
        .query_map([kind], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn open_creates_tables_indexes_and_triggers() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("ledger.db")).unwrap();

    let tables = names(&conn, "table");
    assert!(tables.contains(&"entries".to_string()));
    assert!(tables.contains(&"entries_fts".to_string()));
    assert!(tables.contains(&"schema_meta".to_string()));

    let indexes = names(&conn, "index");
    for idx in ["idx_entries_dedup", "idx_entries_session", "idx_entries_session_type"] {
        assert!(indexes.contains(&idx.to_string()), "missing index {idx}");
    }

    let triggers = names(&conn, "trigger");
    assert_eq!(triggers, vec!["entries_ad", "entries_ai", "entries_au"]);
}

#[test]
fn open_enables_wal_and_busy_timeout() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("ledger.db")).unwrap();

    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn check_constraints_reject_bad_rows() {
    let conn = db::open_memory_database().unwrap();
    let insert = |entry_type: &str, content: &str, importance: &str| {
        conn.execute(
            "INSERT INTO entries (session_id, entry_type, content, importance, content_hash, created_at)
             VALUES ('s', ?1, ?2, ?3, 'h', '2024-01-01T00:00:00.000000Z')",
            [entry_type, content, importance],
        )
    };
    assert!(insert("memo", "x", "high").is_err());
    assert!(insert("learning", "   ", "high").is_err());
    assert!(insert("learning", "x", "urgent").is_err());
    assert!(insert("learning", "x", "high").is_ok());
}

#[test]
fn reopening_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ledger.db");
    drop(db::open_database(&path).unwrap());
    let conn = db::open_database(&path).unwrap();
    assert_eq!(
        db::migrations::get_schema_version(&conn).unwrap().as_deref(),
        Some(db::migrations::CURRENT_SCHEMA_VERSION)
    );
}
