use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::migrations::config::{migrate_config, CURRENT_CONFIG_VERSION};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Stamped by config migrations; `None` for files older than versioning.
    pub version: Option<String>,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub buffer: BufferConfig,
    pub restoration: RestorationConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for per-session buffer directories.
    pub base_dir: String,
    pub db_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BufferConfig {
    /// Context usage (percent) at which `ledger status` starts a background flush.
    pub auto_flush_percent: f64,
    /// `ledger` executable for background flushes. Unset means the running
    /// executable, which is only right when that is `ledger` itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_program: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RestorationConfig {
    pub high_decisions_limit: usize,
    pub learnings_limit: usize,
    pub file_edits_limit: usize,
    pub medium_decisions_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub min_content_chars: usize,
    pub max_content_chars: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            version: Some(CURRENT_CONFIG_VERSION.to_string()),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            buffer: BufferConfig::default(),
            restoration: RestorationConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        // Hooks run inside the host tool; stay quiet unless asked.
        Self {
            level: "warn".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_ledger_dir();
        Self {
            base_dir: base.to_string_lossy().into_owned(),
            db_path: base.join("ledger.db").to_string_lossy().into_owned(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            auto_flush_percent: 80.0,
            flush_program: None,
        }
    }
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            high_decisions_limit: 10,
            learnings_limit: 10,
            file_edits_limit: 10,
            medium_decisions_limit: 5,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "claude".into(),
            args: vec!["-p".into()],
            timeout_secs: 90,
            min_content_chars: 200,
            max_content_chars: 60_000,
        }
    }
}

/// Returns `~/.ledger/`, or a directory under the system temp dir when no
/// home directory can be determined.
pub fn default_ledger_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".ledger")
}

/// Returns the default config file path: `$LEDGER_HOME/config.json` when the
/// variable is set, `~/.ledger/config.json` otherwise.
pub fn default_config_path() -> PathBuf {
    match std::env::var("LEDGER_HOME") {
        Ok(home) if !home.is_empty() => expand_tilde(&home).join("config.json"),
        _ => default_ledger_dir().join("config.json"),
    }
}

impl LedgerConfig {
    /// Load config from the default JSON file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, migrating the file forward if it was
    /// written by an older release, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut explicit_db_path = false;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).context("failed to read config file")?;
            let mut doc: serde_json::Value =
                serde_json::from_str(&contents).context("failed to parse config JSON")?;

            let outcome = migrate_config(&mut doc).context("failed to migrate config")?;
            if outcome.needs_stamp() {
                info!(path = %path.display(), ?outcome, "config migrated");
                if let Err(e) = write_atomic(path, &doc) {
                    // The migrated document is still used for this run.
                    warn!(path = %path.display(), error = %e, "failed to persist migrated config");
                }
            }

            explicit_db_path = doc.pointer("/storage/db_path").is_some();
            serde_json::from_value(doc).context("invalid config structure")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LedgerConfig::default()
        };

        config.apply_overrides(explicit_db_path, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides (LEDGER_HOME, LEDGER_DB, LEDGER_LOG_LEVEL).
    ///
    /// `LEDGER_HOME` also moves the database into the new base dir unless the
    /// config file names a `db_path` of its own.
    fn apply_overrides(&mut self, explicit_db_path: bool, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("LEDGER_HOME") {
            if !explicit_db_path {
                self.storage.db_path = expand_tilde(&val).join("ledger.db").to_string_lossy().into_owned();
            }
            self.storage.base_dir = val;
        }
        if let Some(val) = var("LEDGER_DB") {
            self.storage.db_path = val;
        }
        if let Some(val) = var("LEDGER_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Config rooted at `base_dir`, with the database inside it. Used by tests
    /// and embedders that manage their own directories.
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        let mut config = LedgerConfig::default();
        config.storage.base_dir = base.to_string_lossy().into_owned();
        config.storage.db_path = base.join("ledger.db").to_string_lossy().into_owned();
        config
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_base_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.base_dir)
    }

    /// Directory holding one subdirectory per session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.resolved_base_dir().join("sessions")
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Write JSON via a temp file and rename so readers never see a partial file.
fn write_atomic(path: &Path, doc: &serde_json::Value) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(doc)?;
    std::fs::write(&tmp_path, body)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path).context("failed to rename temp config")?;
    Ok(())
}
