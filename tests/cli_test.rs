use serde_json::json;
use std::process::Command;
use tempfile::TempDir;

fn ledger() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ledger"));
    cmd.env_remove("LEDGER_HOME")
        .env_remove("LEDGER_DB")
        .env_remove("LEDGER_LOG_LEVEL");
    cmd
}

#[test]
fn newer_config_warning_reaches_stderr() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    let body = json!({
        "version": "99.0.0",
        "storage": {
            "base_dir": tmp.path(),
            "db_path": tmp.path().join("ledger.db"),
        }
    })
    .to_string();
    std::fs::write(&path, &body).unwrap();

    let output = ledger().arg("--config").arg(&path).arg("stats").output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("newer than this binary"), "stderr: {stderr}");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), body);
}

#[test]
fn ledger_home_alone_relocates_the_database() {
    let tmp = TempDir::new().unwrap();
    let output = ledger()
        .env("LEDGER_HOME", tmp.path())
        .args(["purge", "--session", "s"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    assert!(tmp.path().join("ledger.db").exists());
}
