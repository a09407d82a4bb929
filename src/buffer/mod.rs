//! Per-session append buffer and the flush pipeline into the database.
//!
//! Layout of one session directory:
//!
//! ```text
//! <base_dir>/sessions/<session_id>/
//!     ledger_buffer.jsonl            entries not yet flushed
//!     ledger_buffer.flushing.jsonl   entries claimed by a flush in progress (or orphaned)
//!     ledger_buffer.lock             flock target for buffer mutations, never deleted
//!     ledger_buffer.flushing.lock    flock held by whoever is storing the flushing file
//! ```
//!
//! A flush claims the buffer by renaming it under the session lock, then
//! inserts outside the lock. New appends start a fresh buffer file while the
//! claimed one is being stored, so writers are never blocked on the database.
//!
//! The flushing file belongs to the holder of the flush lock, from the claim
//! until the file is removed. A flushing file whose flush lock is free was
//! left by a process that died, and only then does [`Buffer::recover`] replay it.

pub mod lock;
pub mod log;

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::config::{expand_tilde, LedgerConfig};
use crate::db::Database;
use crate::entries::types::{is_valid_session_id, Entry};
pub use lock::SessionLock;
pub use log::{AppendLog, JsonLinesLog};

pub const BUFFER_FILE: &str = "ledger_buffer.jsonl";
pub const FLUSHING_FILE: &str = "ledger_buffer.flushing.jsonl";
pub const LOCK_FILE: &str = "ledger_buffer.lock";
pub const FLUSH_LOCK_FILE: &str = "ledger_buffer.flushing.lock";

/// Reason reported when a flush finds another one already running.
pub const FLUSH_CONFLICT: &str = "another flush in progress";

/// Outcome of a flush or recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushResult {
    pub success: bool,
    /// Rows newly stored; duplicates of existing rows are not counted.
    pub entries_flushed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FlushResult {
    fn flushed(entries_flushed: usize) -> Self {
        Self {
            success: true,
            entries_flushed,
            reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            entries_flushed: 0,
            reason: Some(reason.into()),
        }
    }

    fn conflict() -> Self {
        Self::failed(FLUSH_CONFLICT)
    }

    /// True when the flush was refused because another one holds the session.
    pub fn is_conflict(&self) -> bool {
        !self.success && self.reason.as_deref() == Some(FLUSH_CONFLICT)
    }
}

/// Summary of [`Buffer::recover_all`].
#[derive(Debug, Default, Serialize)]
pub struct RecoveryReport {
    pub sessions_scanned: usize,
    pub recovered: Vec<String>,
    pub failed: Vec<String>,
    pub entries_recovered: usize,
}

struct SessionPaths {
    dir: PathBuf,
    buffer: PathBuf,
    flushing: PathBuf,
    lock: PathBuf,
    flush_lock: PathBuf,
}

impl SessionPaths {
    fn new(dir: PathBuf) -> Self {
        Self {
            buffer: dir.join(BUFFER_FILE),
            flushing: dir.join(FLUSHING_FILE),
            lock: dir.join(LOCK_FILE),
            flush_lock: dir.join(FLUSH_LOCK_FILE),
            dir,
        }
    }
}

enum Claim {
    /// Holds the flush lock until the flushing file is stored and removed.
    Claimed(SessionLock),
    Empty,
    Conflict,
}

/// Crash-safe session buffer in front of the [`Database`].
///
/// All public methods fail soft: errors are logged and reported as
/// `false`, `0`, empty, or a failed [`FlushResult`].
pub struct Buffer<L: AppendLog = JsonLinesLog> {
    base_dir: PathBuf,
    db: Database,
    log: L,
    flush_program: Option<PathBuf>,
}

impl Buffer<JsonLinesLog> {
    pub fn new(base_dir: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            base_dir: base_dir.into(),
            db,
            log: JsonLinesLog,
            flush_program: None,
        }
    }

    /// Buffer rooted at the configured base dir. Hosts other than the
    /// `ledger` binary must set `buffer.flush_program` (or call
    /// [`Buffer::with_flush_program`]) before using [`Buffer::flush_async`].
    pub fn from_config(config: &LedgerConfig) -> Self {
        let buffer = Self::new(config.resolved_base_dir(), Database::from_config(config));
        match &config.buffer.flush_program {
            Some(program) => buffer.with_flush_program(expand_tilde(program)),
            None => buffer,
        }
    }
}

impl<L: AppendLog> Buffer<L> {
    /// Swap the on-disk encoding.
    pub fn with_log<M: AppendLog>(self, log: M) -> Buffer<M> {
        Buffer {
            base_dir: self.base_dir,
            db: self.db,
            log,
            flush_program: self.flush_program,
        }
    }

    /// Executable spawned by [`Buffer::flush_async`]. Defaults to the current
    /// executable, so an embedding host would otherwise re-run itself.
    pub fn with_flush_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.flush_program = Some(program.into());
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join("sessions")
    }

    pub fn session_dir(&self, session_id: &str) -> Option<PathBuf> {
        is_valid_session_id(session_id).then(|| self.sessions_dir().join(session_id))
    }

    fn paths(&self, session_id: &str) -> Option<SessionPaths> {
        self.session_dir(session_id).map(SessionPaths::new)
    }

    /// Append one entry. `false` if it is invalid or could not be written.
    pub fn append(&self, session_id: &str, entry: &Entry) -> bool {
        self.append_many(session_id, std::slice::from_ref(entry)) == 1
    }

    /// Append the valid entries in order as one contiguous block. Returns how
    /// many were written.
    pub fn append_many(&self, session_id: &str, entries: &[Entry]) -> usize {
        let Some(paths) = self.paths(session_id) else {
            return 0;
        };
        let valid: Vec<Entry> = entries.iter().filter(|e| e.is_valid()).cloned().collect();
        if valid.is_empty() {
            return 0;
        }

        let result = (|| -> Result<()> {
            std::fs::create_dir_all(&paths.dir)
                .with_context(|| format!("failed to create {}", paths.dir.display()))?;
            let _lock = SessionLock::acquire(&paths.lock)?;
            self.log.append(&paths.buffer, &valid)
        })();

        match result {
            Ok(()) => {
                debug!(session = session_id, entries = valid.len(), "buffered");
                valid.len()
            }
            Err(e) => {
                warn!(session = session_id, error = %format!("{e:#}"), "append failed");
                0
            }
        }
    }

    /// Entries currently buffered (not counting a flush in progress).
    pub fn read(&self, session_id: &str) -> Vec<Entry> {
        let Some(paths) = self.paths(session_id) else {
            return Vec::new();
        };
        self.log.read(&paths.buffer).unwrap_or_else(|e| {
            warn!(session = session_id, error = %format!("{e:#}"), "buffer read failed");
            Vec::new()
        })
    }

    pub fn count(&self, session_id: &str) -> usize {
        self.read(session_id).len()
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.paths(session_id).is_some_and(|p| p.buffer.exists())
    }

    pub fn flush_in_progress(&self, session_id: &str) -> bool {
        self.paths(session_id).is_some_and(|p| p.flushing.exists())
    }

    /// Discard the buffered entries. `true` once nothing is left buffered.
    pub fn clear(&self, session_id: &str) -> bool {
        let Some(paths) = self.paths(session_id) else {
            return false;
        };
        if !paths.dir.exists() {
            return true;
        }
        let result = (|| -> Result<()> {
            let _lock = SessionLock::acquire(&paths.lock)?;
            remove_if_exists(&paths.buffer)
        })();
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(session = session_id, error = %format!("{e:#}"), "clear failed");
                false
            }
        }
    }

    /// Move the buffered entries into the database, in this process.
    ///
    /// Never waits for a concurrent flush: if one holds the session, this
    /// returns a conflict right away and the entries stay for the next flush.
    pub fn flush_sync(&self, session_id: &str) -> FlushResult {
        let Some(paths) = self.paths(session_id) else {
            return FlushResult::failed("invalid session id");
        };
        if paths.flushing.exists() {
            return FlushResult::conflict();
        }
        if !paths.buffer.exists() {
            return FlushResult::flushed(0);
        }

        match claim(&paths) {
            Ok(Claim::Claimed(_flush_lock)) => self.drain(session_id, &paths),
            Ok(Claim::Empty) => FlushResult::flushed(0),
            Ok(Claim::Conflict) => FlushResult::conflict(),
            Err(e) => {
                warn!(session = session_id, error = %format!("{e:#}"), "failed to claim buffer");
                FlushResult::failed(format!("failed to claim buffer: {e:#}"))
            }
        }
    }

    /// Start a detached `flush --session <id>` process and return immediately.
    ///
    /// The child inherits the base dir and database path through
    /// `LEDGER_HOME` / `LEDGER_DB`. Its outcome is not observed.
    pub fn flush_async(&self, session_id: &str) -> FlushResult {
        let Some(paths) = self.paths(session_id) else {
            return FlushResult::failed("invalid session id");
        };
        if paths.flushing.exists() {
            return FlushResult::conflict();
        }
        if !paths.buffer.exists() {
            return FlushResult::flushed(0);
        }

        let program = match &self.flush_program {
            Some(program) => program.clone(),
            None => match std::env::current_exe() {
                Ok(exe) => exe,
                Err(e) => {
                    warn!(session = session_id, error = %e, "cannot locate flush executable");
                    return FlushResult::failed(format!("cannot locate flush executable: {e}"));
                }
            },
        };

        let spawned = Command::new(&program)
            .args(["flush", "--session", session_id])
            .env("LEDGER_HOME", &self.base_dir)
            .env("LEDGER_DB", self.db.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn();

        match spawned {
            Ok(child) => {
                let pid = child.id();
                info!(session = session_id, pid, "spawned background flush");
                FlushResult {
                    success: true,
                    entries_flushed: 0,
                    reason: Some(format!("spawned flush process {pid}")),
                }
            }
            Err(e) => {
                warn!(session = session_id, program = %program.display(), error = %e, "spawn failed");
                FlushResult::failed(format!("failed to spawn flush process: {e}"))
            }
        }
    }

    /// Replay an orphaned flushing file left behind by a crashed flush.
    ///
    /// A flushing file that a live flush is still storing is not an orphan:
    /// that case returns a conflict and the file is left alone.
    pub fn recover(&self, session_id: &str) -> FlushResult {
        let Some(paths) = self.paths(session_id) else {
            return FlushResult::failed("invalid session id");
        };
        if !paths.flushing.exists() {
            return FlushResult::flushed(0);
        }
        let _flush_lock = match SessionLock::try_acquire(&paths.flush_lock) {
            Ok(Some(guard)) => guard,
            Ok(None) => return FlushResult::conflict(),
            Err(e) => {
                warn!(session = session_id, error = %format!("{e:#}"), "failed to take flush lock");
                return FlushResult::failed(format!("failed to take flush lock: {e:#}"));
            }
        };
        // The previous holder may have finished between the check and the lock.
        if !paths.flushing.exists() {
            return FlushResult::flushed(0);
        }
        info!(session = session_id, "recovering orphaned flush");
        self.drain(session_id, &paths)
    }

    /// Run [`Buffer::recover`] for every session directory.
    pub fn recover_all(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();
        for session_id in self.list_sessions() {
            report.sessions_scanned += 1;
            if !self.flush_in_progress(&session_id) {
                continue;
            }
            let result = self.recover(&session_id);
            if result.is_conflict() {
                debug!(session = session_id, "flush still running, not an orphan");
            } else if result.success {
                report.entries_recovered += result.entries_flushed;
                report.recovered.push(session_id);
            } else {
                report.failed.push(session_id);
            }
        }
        report
    }

    /// Ids of every session that has a directory, sorted.
    pub fn list_sessions(&self) -> Vec<String> {
        let dir = self.sessions_dir();
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list sessions");
                return Vec::new();
            }
        };
        let mut sessions: Vec<String> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_valid_session_id(name))
            .collect();
        sessions.sort();
        sessions
    }

    /// Store the claimed flushing file and delete it. Callers hold the flush
    /// lock. On any failure the file is left in place for [`Buffer::recover`].
    fn drain(&self, session_id: &str, paths: &SessionPaths) -> FlushResult {
        let entries = match self.log.read(&paths.flushing) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(session = session_id, error = %format!("{e:#}"), "failed to read flushing file");
                return FlushResult::failed(format!("failed to read flushing file: {e:#}"));
            }
        };

        let stored = match self.db.try_insert_many(session_id, &entries) {
            Ok(n) => n,
            Err(e) => {
                warn!(session = session_id, entries = entries.len(), error = %format!("{e:#}"), "flush insert failed");
                return FlushResult::failed(format!("database insert failed: {e:#}"));
            }
        };

        if let Err(e) = remove_if_exists(&paths.flushing) {
            warn!(session = session_id, error = %format!("{e:#}"), "failed to remove flushing file");
            return FlushResult {
                success: false,
                entries_flushed: stored,
                reason: Some(format!("failed to remove flushing file: {e:#}")),
            };
        }

        info!(session = session_id, read = entries.len(), stored, "flushed");
        FlushResult::flushed(stored)
    }
}

/// Rename buffer → flushing under the session lock, re-checking both files
/// once the lock is held. The flush lock is taken first and handed back to
/// the caller with the claim.
fn claim(paths: &SessionPaths) -> Result<Claim> {
    let _lock = SessionLock::acquire(&paths.lock)?;
    let Some(flush_lock) = SessionLock::try_acquire(&paths.flush_lock)? else {
        return Ok(Claim::Conflict);
    };
    if paths.flushing.exists() {
        return Ok(Claim::Conflict);
    }
    if !paths.buffer.exists() {
        return Ok(Claim::Empty);
    }
    std::fs::rename(&paths.buffer, &paths.flushing)
        .with_context(|| format!("failed to rename {}", paths.buffer.display()))?;
    Ok(Claim::Claimed(flush_lock))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}
