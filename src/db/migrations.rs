//! Forward-only schema migrations.
//!
//! Tracks the schema version in `schema_meta` and runs the registered steps
//! between the stored version and [`CURRENT_SCHEMA_VERSION`], each in its own
//! transaction.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::migrations::{plan, Migration, MigrationOutcome, Plan};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: &str = "0.3.0";

type SchemaStep = fn(&Connection) -> rusqlite::Result<()>;

const SCHEMA_MIGRATIONS: &[Migration<SchemaStep>] = &[
    Migration {
        version: "0.2.0",
        description: "add enrichment columns to entries",
        apply: add_enrichment_columns,
    },
    Migration {
        version: "0.3.0",
        description: "rebuild full-text index over content and entry_type",
        apply: rebuild_fts_index,
    },
];

/// Get the stored schema version, if any.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

/// Update the stored schema version.
fn set_schema_version(conn: &Connection, version: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [version],
    )?;
    Ok(())
}

/// Run any pending migrations and stamp the current version.
///
/// A database stamped by a newer binary is left untouched.
pub fn run_migrations(conn: &Connection) -> Result<MigrationOutcome> {
    let stored = get_schema_version(conn)?;
    tracing::debug!(
        schema_version = stored.as_deref().unwrap_or("unversioned"),
        target = CURRENT_SCHEMA_VERSION,
        "checking migrations"
    );

    match plan(SCHEMA_MIGRATIONS, stored.as_deref(), CURRENT_SCHEMA_VERSION)? {
        Plan::UpToDate => Ok(MigrationOutcome::UpToDate),
        Plan::Downgrade { stored, current } => {
            tracing::warn!(
                %stored,
                %current,
                "database schema is newer than this binary, not migrating"
            );
            Ok(MigrationOutcome::Downgrade {
                stored: stored.to_string(),
                current: current.to_string(),
            })
        }
        Plan::Upgrade { from, to, steps } => {
            let mut applied = Vec::with_capacity(steps.len());
            for step in steps {
                tracing::info!(to = step.version, "running migration: {}", step.description);
                let tx = conn.unchecked_transaction()?;
                (step.apply)(&*tx).with_context(|| format!("migration {} failed", step.version))?;
                set_schema_version(&tx, step.version)?;
                tx.commit()?;
                applied.push(step.version.to_string());
            }
            set_schema_version(conn, CURRENT_SCHEMA_VERSION)?;
            Ok(MigrationOutcome::Migrated {
                from: from.to_string(),
                to: to.to_string(),
                applied,
            })
        }
    }
}

/// Migration 0.1.0 → 0.2.0: enrichment columns. Skips columns that exist.
fn add_enrichment_columns(conn: &Connection) -> rusqlite::Result<()> {
    let existing: Vec<String> = conn
        .prepare("SELECT name FROM pragma_table_info('entries')")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for column in ["source", "category", "keywords", "applies_when", "source_file", "metadata"] {
        if !existing.iter().any(|c| c == column) {
            conn.execute_batch(&format!("ALTER TABLE entries ADD COLUMN {column} TEXT"))?;
        }
    }
    Ok(())
}

/// Migration 0.2.0 → 0.3.0: drop whatever full-text index exists and rebuild
/// it, with triggers, over `(content, entry_type)`.
fn rebuild_fts_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DROP TRIGGER IF EXISTS entries_ai;
         DROP TRIGGER IF EXISTS entries_ad;
         DROP TRIGGER IF EXISTS entries_au;
         DROP TABLE IF EXISTS entries_fts;",
    )?;
    conn.execute_batch(super::schema::FTS_SQL)?;
    conn.execute("INSERT INTO entries_fts(entries_fts) VALUES ('rebuild')", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn fresh_db_starts_at_oldest_version() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap().as_deref(), Some("0.1.0"));
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let conn = test_db();
        let outcome = run_migrations(&conn).unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                from: "0.1.0".into(),
                to: CURRENT_SCHEMA_VERSION.into(),
                applied: vec!["0.2.0".into(), "0.3.0".into()],
            }
        );
        assert_eq!(
            get_schema_version(&conn).unwrap().as_deref(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        let second = run_migrations(&conn).unwrap(); // second call should not error
        assert_eq!(second, MigrationOutcome::UpToDate);
    }

    #[test]
    fn rerunning_steps_on_current_schema_is_harmless() {
        let conn = test_db();
        // Steps may run against a schema that already has their changes
        add_enrichment_columns(&conn).unwrap();
        rebuild_fts_index(&conn).unwrap();
        rebuild_fts_index(&conn).unwrap();
    }

    #[test]
    fn newer_schema_is_not_touched() {
        let conn = test_db();
        set_schema_version(&conn, "7.0.0").unwrap();
        let outcome = run_migrations(&conn).unwrap();
        assert!(matches!(outcome, MigrationOutcome::Downgrade { .. }));
        assert_eq!(get_schema_version(&conn).unwrap().as_deref(), Some("7.0.0"));
    }
}
