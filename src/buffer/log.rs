use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;

use crate::entries::types::Entry;

/// On-disk encoding of a session buffer.
///
/// `append` is called with the session lock held and must write all entries
/// with a single write so that concurrent appenders never interleave.
/// `read` is best-effort: undecodable records are skipped, a missing file
/// reads as empty.
pub trait AppendLog: Send + Sync {
    fn append(&self, path: &Path, entries: &[Entry]) -> Result<()>;
    fn read(&self, path: &Path) -> Result<Vec<Entry>>;
}

/// One JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesLog;

impl AppendLog for JsonLinesLog {
    fn append(&self, path: &Path, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut chunk = String::new();
        for entry in entries {
            chunk.push_str(&serde_json::to_string(entry)?);
            chunk.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(chunk.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<Entry>> {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("failed to open {}", path.display())),
        };

        let mut entries = Vec::new();
        // Raw bytes: a torn multibyte write must cost one line, not the file.
        for (lineno, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line.with_context(|| format!("failed to read {}", path.display()))?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let text = match std::str::from_utf8(&line) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(line = lineno + 1, error = %e, "skipping non-UTF-8 buffer line");
                    continue;
                }
            };
            match serde_json::from_str::<Entry>(text) {
                Ok(entry) if entry.is_valid() => entries.push(entry),
                Ok(_) => tracing::debug!(line = lineno + 1, "skipping invalid buffered entry"),
                Err(e) => tracing::debug!(line = lineno + 1, error = %e, "skipping malformed buffer line"),
            }
        }
        Ok(entries)
    }
}
