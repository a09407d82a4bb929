//! Turns a raw session transcript into stored entries with the help of an
//! external collaborator (an LLM behind a command line tool).

pub mod collaborator;
pub mod prompt;
pub mod response;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ExtractionConfig, LedgerConfig};
use crate::db::Database;
use crate::entries::types::is_valid_session_id;
pub use collaborator::{CliCollaborator, Collaborator};
pub use response::{parse_response, ParsedResponse};

/// Outcome of one extraction run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Items proposed by the collaborator.
    pub found: usize,
    /// New rows written; duplicates of existing rows are not counted.
    pub stored: usize,
    /// Items that failed validation.
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub struct ExtractionOrchestrator<C: Collaborator> {
    db: Database,
    collaborator: C,
    config: ExtractionConfig,
    prompt: String,
}

impl ExtractionOrchestrator<CliCollaborator> {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            Database::from_config(config),
            CliCollaborator::from_config(&config.extraction),
            config.extraction.clone(),
        )
    }
}

impl<C: Collaborator> ExtractionOrchestrator<C> {
    pub fn new(db: Database, collaborator: C, config: ExtractionConfig) -> Self {
        Self {
            db,
            collaborator,
            config,
            prompt: prompt::DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    /// Ask the collaborator for entries and store the valid ones directly in
    /// the database. Never fails: every problem yields a smaller report.
    pub async fn extract(&self, session_id: &str, content: &str) -> ExtractionReport {
        if !self.config.enabled || !is_valid_session_id(session_id) {
            return ExtractionReport::default();
        }
        let chars = content.chars().count();
        if chars < self.config.min_content_chars {
            debug!(session = session_id, chars, "transcript too short to extract");
            return ExtractionReport::default();
        }
        let content = tail_chars(content, self.config.max_content_chars);

        let Some(raw) = self.collaborator.complete(content, &self.prompt).await else {
            return ExtractionReport::default();
        };
        let Some(parsed) = parse_response(&raw) else {
            debug!(session = session_id, "collaborator reply was not JSON");
            return ExtractionReport::default();
        };

        let entries: Vec<_> = parsed
            .entries
            .into_iter()
            .map(|e| e.with_metadata("origin", Value::from("extraction")))
            .collect();
        let stored = self.db.insert_many(session_id, &entries);

        info!(
            session = session_id,
            found = parsed.found,
            stored,
            rejected = parsed.rejected,
            "extraction complete"
        );
        ExtractionReport {
            found: parsed.found,
            stored,
            rejected: parsed.rejected,
            summary: parsed.summary,
        }
    }
}

/// The last `max` characters of `s`, cut on a char boundary.
fn tail_chars(s: &str, max: usize) -> &str {
    let total = s.chars().count();
    if total <= max {
        return s;
    }
    match s.char_indices().nth(total - max) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(tail_chars("abc", 0), "");
    }
}
