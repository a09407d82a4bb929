//! Rebuild a bounded "what mattered" summary for a session after a context
//! reset.
//!
//! Tier 1 is everything the assistant must not lose: all guidelines, all
//! implementation plans and the most recent high-importance decisions.
//! Tier 2 is best-effort support, with an independent limit per category.

use serde::Serialize;
use std::fmt::Write;

use crate::config::{LedgerConfig, RestorationConfig};
use crate::db::Database;
use crate::entries::query::{Tier1, Tier2};
use crate::entries::types::StoredEntry;

pub const NO_CONTEXT: &str = "No previous context for this session.";

#[derive(Debug, Clone, Serialize)]
pub struct RestorationPayload {
    pub session_id: String,
    pub tier1: Tier1,
    pub tier2: Tier2,
}

impl RestorationPayload {
    pub fn len(&self) -> usize {
        self.tier1.len() + self.tier2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tier1.is_empty() && self.tier2.is_empty()
    }

    /// Markdown grouped by tier, then category.
    pub fn to_markdown(&self) -> String {
        if self.is_empty() {
            return NO_CONTEXT.to_string();
        }

        let mut out = String::new();
        let _ = writeln!(out, "# Restored context (session {})", self.session_id);

        if !self.tier1.is_empty() {
            let _ = writeln!(out, "\n## Essential");
            section(&mut out, "Guidelines", &self.tier1.guidelines);
            section(&mut out, "Implementation plans", &self.tier1.implementation_plans);
            section(&mut out, "Key decisions", &self.tier1.decisions);
        }
        if !self.tier2.is_empty() {
            let _ = writeln!(out, "\n## Supporting");
            section(&mut out, "Learnings", &self.tier2.learnings);
            section(&mut out, "Files edited", &self.tier2.file_edits);
            section(&mut out, "Other decisions", &self.tier2.decisions);
        }
        out
    }
}

fn section(out: &mut String, title: &str, entries: &[StoredEntry]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n### {title}\n");
    for stored in entries {
        let entry = &stored.entry;
        let _ = write!(out, "- {}", entry.content.trim());
        if let Some(category) = &entry.category {
            let _ = write!(out, " [{category}]");
        }
        if let Some(when) = &entry.applies_when {
            let _ = write!(out, " (applies when: {when})");
        }
        out.push('\n');
    }
}

/// Runs the tier queries with the configured limits.
pub struct RestorationEngine {
    db: Database,
    limits: RestorationConfig,
}

impl RestorationEngine {
    pub fn new(db: Database, limits: RestorationConfig) -> Self {
        Self { db, limits }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(Database::from_config(config), config.restoration.clone())
    }

    /// Query both tiers. Database failures yield an empty payload.
    pub fn restore(&self, session_id: &str) -> RestorationPayload {
        let tier1 = self.db.query_tier1(session_id, self.limits.high_decisions_limit);
        let tier2 = self.db.query_tier2(
            session_id,
            self.limits.learnings_limit,
            self.limits.file_edits_limit,
            self.limits.medium_decisions_limit,
        );
        tracing::debug!(session = session_id, tier1 = tier1.len(), tier2 = tier2.len(), "restored");
        RestorationPayload {
            session_id: session_id.to_string(),
            tier1,
            tier2,
        }
    }

    pub fn render(&self, session_id: &str) -> String {
        self.restore(session_id).to_markdown()
    }
}
