//! Context-usage payloads sent by the host tool's status hook.
//!
//! Two shapes exist in the wild:
//!
//! ```json
//! {"session_id": "abc", "context_percent": 81.5}
//! {"format": "enhanced", "session": {"id": "abc"}, "context": {"used_tokens": 163000, "max_tokens": 200000}}
//! ```
//!
//! The shape is decided once, at parse time; everything downstream goes
//! through the accessors.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyStatus {
    pub session_id: String,
    #[serde(default)]
    pub context_percent: Option<f64>,
    #[serde(default)]
    pub used_tokens: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContextUsage {
    #[serde(default)]
    pub used_percent: Option<f64>,
    #[serde(default)]
    pub used_tokens: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnhancedStatus {
    pub session: SessionInfo,
    #[serde(default)]
    pub context: ContextUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusPayload {
    Legacy(LegacyStatus),
    Enhanced(EnhancedStatus),
}

impl StatusPayload {
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("status payload is not JSON")?;
        Self::from_value(value)
    }

    /// An explicit `format` field wins; otherwise a nested `session` object
    /// means the enhanced shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let enhanced = match value.get("format").and_then(Value::as_str) {
            Some("enhanced") => true,
            Some("legacy") => false,
            Some(other) => bail!("unknown status format {other:?}"),
            None => value.get("session").is_some_and(Value::is_object),
        };
        if enhanced {
            let status = serde_json::from_value(value).context("invalid enhanced status payload")?;
            Ok(Self::Enhanced(status))
        } else {
            let status = serde_json::from_value(value).context("invalid legacy status payload")?;
            Ok(Self::Legacy(status))
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Legacy(s) => &s.session_id,
            Self::Enhanced(s) => &s.session.id,
        }
    }

    /// Context usage in percent, from the explicit figure or the token counts.
    pub fn context_percent(&self) -> Option<f64> {
        let (percent, used, max) = match self {
            Self::Legacy(s) => (s.context_percent, s.used_tokens, s.max_tokens),
            Self::Enhanced(s) => (s.context.used_percent, s.context.used_tokens, s.context.max_tokens),
        };
        percent.or_else(|| match (used, max) {
            (Some(used), Some(max)) if max > 0 => Some(used as f64 * 100.0 / max as f64),
            _ => None,
        })
    }

    pub fn should_flush(&self, threshold_percent: f64) -> bool {
        self.context_percent().is_some_and(|p| p >= threshold_percent)
    }
}
