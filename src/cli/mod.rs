pub mod doctor;
pub mod extract;
pub mod flush;
pub mod maintenance;
pub mod restore;
pub mod search;
pub mod stats;
pub mod status;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read a whole input: the given file, or stdin when `None` or `-`.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Truncate to `max` characters for one-line previews.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
