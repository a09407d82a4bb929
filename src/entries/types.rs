//! Core entry type definitions.
//!
//! Defines [`EntryType`] (the closed set of things a hook can capture),
//! [`Importance`], [`Source`], [`Entry`] (a record before it is stored) and
//! [`StoredEntry`] (a row of the `entries` table).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Why an entry was rejected before reaching the buffer or the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entry must be a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown entry type: {0}")]
    UnknownEntryType(String),
    #[error("unknown importance: {0}")]
    UnknownImportance(String),
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error("entry content is empty")]
    EmptyContent,
}

/// What kind of fact an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    FileRead,
    FileEdit,
    FileWrite,
    Search,
    /// An instruction the user gave about how to proceed.
    Direction,
    Preference,
    Constraint,
    Learning,
    Decision,
    Discovery,
    /// Standing rule that should survive every context reset.
    Guideline,
    ImplementationPlan,
    Reference,
}

impl EntryType {
    pub const ALL: [EntryType; 13] = [
        Self::FileRead,
        Self::FileEdit,
        Self::FileWrite,
        Self::Search,
        Self::Direction,
        Self::Preference,
        Self::Constraint,
        Self::Learning,
        Self::Decision,
        Self::Discovery,
        Self::Guideline,
        Self::ImplementationPlan,
        Self::Reference,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileRead => "file_read",
            Self::FileEdit => "file_edit",
            Self::FileWrite => "file_write",
            Self::Search => "search",
            Self::Direction => "direction",
            Self::Preference => "preference",
            Self::Constraint => "constraint",
            Self::Learning => "learning",
            Self::Decision => "decision",
            Self::Discovery => "discovery",
            Self::Guideline => "guideline",
            Self::ImplementationPlan => "implementation_plan",
            Self::Reference => "reference",
        }
    }

    /// Human-readable heading used when rendering restored context.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FileRead => "Files read",
            Self::FileEdit => "Files edited",
            Self::FileWrite => "Files written",
            Self::Search => "Searches",
            Self::Direction => "Directions",
            Self::Preference => "Preferences",
            Self::Constraint => "Constraints",
            Self::Learning => "Learnings",
            Self::Decision => "Decisions",
            Self::Discovery => "Discoveries",
            Self::Guideline => "Guidelines",
            Self::ImplementationPlan => "Implementation plans",
            Self::Reference => "References",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownEntryType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Importance {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ValidationError::UnknownImportance(s.to_string())),
        }
    }
}

/// Who originated an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    User,
    Assistant,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(ValidationError::UnknownSource(s.to_string())),
        }
    }
}

/// A single classified fact captured during a session.
///
/// This is also the line format of the session buffer, so field names are
/// part of the on-disk contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_type: EntryType,
    pub content: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Opaque caller-supplied data, stored as JSON.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Free-text condition describing when a guideline applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(entry_type: EntryType, content: impl Into<String>, importance: Importance) -> Self {
        Self {
            entry_type,
            content: content.into(),
            importance,
            source: None,
            metadata: Map::new(),
            category: None,
            keywords: Vec::new(),
            applies_when: None,
            source_file: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_applies_when(mut self, applies_when: impl Into<String>) -> Self {
        self.applies_when = Some(applies_when.into());
        self
    }

    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Typed fields already enforce the closed sets; only content needs a check.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Build an entry from untyped JSON (hook payloads, extraction output).
    ///
    /// Accepts `entry_type` or `type` for the kind. `importance` defaults to
    /// medium when absent but is rejected when present and unknown.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let entry_type: EntryType = obj
            .get("entry_type")
            .or_else(|| obj.get("type"))
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingField("entry_type"))?
            .parse()?;

        let content = obj
            .get("content")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingField("content"))?;

        let importance = match obj.get("importance") {
            None | Some(Value::Null) => Importance::default(),
            Some(v) => v
                .as_str()
                .ok_or_else(|| ValidationError::UnknownImportance(v.to_string()))?
                .parse()?,
        };

        let mut entry = Entry::new(entry_type, content, importance);

        if let Some(v) = obj.get("source").filter(|v| !v.is_null()) {
            let source = v
                .as_str()
                .ok_or_else(|| ValidationError::UnknownSource(v.to_string()))?
                .parse()?;
            entry.source = Some(source);
        }

        if let Some(Value::Object(map)) = obj.get("metadata") {
            entry.metadata = map.clone();
        }
        entry.category = optional_string(obj, "category");
        entry.applies_when = optional_string(obj, "applies_when");
        entry.source_file = optional_string(obj, "source_file");
        if let Some(Value::Array(items)) = obj.get("keywords") {
            entry.keywords = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(ts) = obj.get("created_at").and_then(Value::as_str) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
                entry.created_at = parsed.with_timezone(&Utc);
            }
        }

        entry.validate()?;
        Ok(entry)
    }

    /// Deterministic digest of `entry_type` and `content`, used for dedup.
    pub fn content_hash(&self) -> String {
        content_hash(self.entry_type, &self.content)
    }
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// SHA-256 hex digest of `"{entry_type}:{content}"`.
pub fn content_hash(entry_type: EntryType, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fixed-width timestamp format so that text ordering equals time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Session ids are opaque but double as directory names: they must be a
/// single, non-empty path component.
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id != "."
        && session_id != ".."
        && !session_id.contains(['/', '\\', '\0'])
}

/// A row of the `entries` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntry {
    pub id: i64,
    pub session_id: String,
    pub content_hash: String,
    #[serde(flatten)]
    pub entry: Entry,
}
