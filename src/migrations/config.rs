//! Config file migrations (JSON → JSON).

use anyhow::{bail, Result};
use serde_json::{json, Map, Value};

use super::{migrate, Migration, MigrationOutcome, Step};

/// Version stamped into config files written by this binary.
pub const CURRENT_CONFIG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Registered config transforms, keyed by the release that introduced them.
pub const CONFIG_MIGRATIONS: &[Migration<Step<Value>>] = &[
    Migration {
        version: "0.2.0",
        description: "move flat storage and logging keys into sections",
        apply: nest_flat_keys,
    },
    Migration {
        version: "0.3.0",
        description: "rename restoration limits and fill defaults",
        apply: restoration_limits,
    },
];

/// Migrate a parsed config document in place and stamp it when anything ran.
pub fn migrate_config(doc: &mut Value) -> Result<MigrationOutcome> {
    if !doc.is_object() {
        bail!("config root must be a JSON object");
    }
    let stored = doc
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);

    let outcome = migrate(doc, CONFIG_MIGRATIONS, stored.as_deref(), CURRENT_CONFIG_VERSION)?;
    if outcome.needs_stamp() {
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("version".into(), json!(CURRENT_CONFIG_VERSION));
        }
    }
    Ok(outcome)
}

fn section<'a>(root: &'a mut Map<String, Value>, name: &str) -> &'a mut Map<String, Value> {
    let slot = root
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

/// 0.2.0: `db_path`, `base_dir` → `storage.*`; `log_level` → `logging.level`.
fn nest_flat_keys(doc: &mut Value) -> Result<()> {
    let Some(root) = doc.as_object_mut() else {
        bail!("config root must be a JSON object");
    };

    for (flat, nested) in [("db_path", "db_path"), ("base_dir", "base_dir")] {
        if let Some(value) = root.remove(flat) {
            section(root, "storage").entry(nested).or_insert(value);
        }
    }
    if let Some(value) = root.remove("log_level") {
        section(root, "logging").entry("level").or_insert(value);
    }
    Ok(())
}

/// 0.3.0: `restoration.decisions_limit` → `restoration.high_decisions_limit`,
/// plus defaults for any limit that is still missing.
fn restoration_limits(doc: &mut Value) -> Result<()> {
    let Some(root) = doc.as_object_mut() else {
        bail!("config root must be a JSON object");
    };
    let restoration = section(root, "restoration");

    if let Some(value) = restoration.remove("decisions_limit") {
        restoration.entry("high_decisions_limit").or_insert(value);
    }
    for (key, default) in [
        ("high_decisions_limit", 10),
        ("learnings_limit", 10),
        ("file_edits_limit", 10),
        ("medium_decisions_limit", 5),
    ] {
        restoration.entry(key).or_insert(json!(default));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_flat_config_is_nested_and_stamped() {
        let mut doc = json!({
            "db_path": "/tmp/legacy.db",
            "log_level": "debug",
            "restoration": { "decisions_limit": 3 }
        });

        let outcome = migrate_config(&mut doc).unwrap();
        assert!(outcome.needs_stamp());

        assert_eq!(doc["version"], CURRENT_CONFIG_VERSION);
        assert_eq!(doc["storage"]["db_path"], "/tmp/legacy.db");
        assert_eq!(doc["logging"]["level"], "debug");
        assert!(doc.get("db_path").is_none());
        assert_eq!(doc["restoration"]["high_decisions_limit"], 3);
        assert_eq!(doc["restoration"]["learnings_limit"], 10);
        assert!(doc["restoration"].get("decisions_limit").is_none());
    }

    #[test]
    fn nested_value_wins_over_flat_leftover() {
        let mut doc = json!({
            "version": "0.1.0",
            "db_path": "/tmp/flat.db",
            "storage": { "db_path": "/tmp/nested.db" }
        });
        migrate_config(&mut doc).unwrap();
        assert_eq!(doc["storage"]["db_path"], "/tmp/nested.db");
    }

    #[test]
    fn migrating_twice_is_a_no_op() {
        let mut doc = json!({ "log_level": "info" });
        migrate_config(&mut doc).unwrap();
        let once = doc.clone();

        let outcome = migrate_config(&mut doc).unwrap();
        assert_eq!(outcome, MigrationOutcome::UpToDate);
        assert_eq!(doc, once);
    }

    #[test]
    fn newer_config_is_left_untouched() {
        let mut doc = json!({ "version": "99.0.0", "log_level": "trace" });
        let before = doc.clone();
        let outcome = migrate_config(&mut doc).unwrap();
        assert!(matches!(outcome, MigrationOutcome::Downgrade { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn non_object_root_is_rejected() {
        let mut doc = json!([1, 2, 3]);
        assert!(migrate_config(&mut doc).is_err());
    }
}
