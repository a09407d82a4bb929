//! Crash-safe session ledger for coding-assistant hooks.
//!
//! Short-lived hook processes append structured [`entries`] to a per-session
//! [`buffer`]. A flush moves them into a deduplicated, full-text-searchable
//! SQLite store ([`db`]), and after a context reset the [`restore`] engine
//! rebuilds a bounded summary of what mattered. The [`extraction`]
//! orchestrator asks an external model to mine a raw transcript for more
//! entries.
//!
//! | Entry type | Typical origin |
//! |------------|----------------|
//! | `file_read`, `file_edit`, `file_write`, `search` | tool hooks |
//! | `direction`, `preference`, `constraint` | user prompts |
//! | `learning`, `decision`, `discovery` | assistant turns, extraction |
//! | `guideline`, `implementation_plan`, `reference` | extraction, explicit capture |
//!
//! # Architecture
//!
//! - **Buffer**: JSON lines under `<base_dir>/sessions/<id>/`, one `flock`
//!   per session, flush by atomic rename so a crash never loses entries
//! - **Storage**: SQLite in WAL mode, FTS5 external-content index kept in
//!   sync by triggers, dedup on `(session, type, content hash)`
//! - **Migrations**: one semver-ordered engine drives both the config file
//!   and the database schema
//!
//! # Modules
//!
//! - [`config`]: configuration loading from JSON and environment variables
//! - [`migrations`]: version planning shared by config and schema upgrades
//! - [`db`]: connection setup, schema, migrations, health checks, and the fail-soft [`db::Database`] handle
//! - [`entries`]: entry model and the storage-level read/write/search operations
//! - [`buffer`]: per-session append buffer and flush pipeline
//! - [`restore`]: tiered context restoration
//! - [`extraction`]: transcript mining through an external collaborator
//! - [`status`]: context-usage payloads from the host's status hook

pub mod buffer;
pub mod config;
pub mod db;
pub mod entries;
pub mod extraction;
pub mod migrations;
pub mod restore;
pub mod status;
