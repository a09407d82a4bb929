//! The external model that reads a transcript and proposes entries.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;

/// Anything that can turn `(content, prompt)` into a raw text reply.
///
/// `None` means "no usable reply" (timeout, crash, empty output); callers
/// treat it as zero extractions, never as an error.
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn complete(&self, content: &str, prompt: &str) -> Option<String>;
}

/// Runs a command line tool with the prompt as its last argument and the
/// content on stdin.
#[derive(Debug, Clone)]
pub struct CliCollaborator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliCollaborator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Collaborator for CliCollaborator {
    async fn complete(&self, content: &str, prompt: &str) -> Option<String> {
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .arg(prompt)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to spawn collaborator");
                return None;
            }
        };

        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut stdin) = stdin {
                // A collaborator that exits without reading stdin is not an error.
                let _ = stdin.write_all(content.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
            child.wait_with_output().await
        };

        // Dropping `run` on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "collaborator process error");
                return None;
            }
            Err(_) => {
                warn!(program = %self.program, timeout_secs = self.timeout.as_secs_f64(), "collaborator timed out");
                return None;
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "collaborator stderr");
        }
        if !output.status.success() {
            warn!(program = %self.program, status = %output.status, "collaborator failed");
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!stdout.is_empty()).then_some(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn collaborator(path: &Path, timeout: Duration) -> CliCollaborator {
        CliCollaborator::new(path.to_string_lossy(), vec!["--flag".into()], timeout)
    }

    #[tokio::test]
    async fn test_prompt_is_last_argument_and_content_on_stdin() {
        let tmp = TempDir::new().unwrap();
        let path = script(tmp.path(), "echo.sh", "#!/bin/sh\nprintf '%s|%s|' \"$1\" \"$2\"\ncat\n");
        let reply = collaborator(&path, Duration::from_secs(10))
            .complete("transcript body", "the prompt")
            .await;
        assert_eq!(reply.as_deref(), Some("--flag|the prompt|transcript body"));
    }

    #[tokio::test]
    async fn test_timeout_yields_none() {
        let tmp = TempDir::new().unwrap();
        let path = script(tmp.path(), "slow.sh", "#!/bin/sh\nsleep 30\n");
        let started = std::time::Instant::now();
        let reply = collaborator(&path, Duration::from_millis(200))
            .complete("x", "p")
            .await;
        assert!(reply.is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_failure_and_empty_output_yield_none() {
        let tmp = TempDir::new().unwrap();
        let failing = script(tmp.path(), "fail.sh", "#!/bin/sh\necho oops >&2\nexit 3\n");
        let silent = script(tmp.path(), "silent.sh", "#!/bin/sh\nexit 0\n");
        assert!(collaborator(&failing, Duration::from_secs(10)).complete("x", "p").await.is_none());
        assert!(collaborator(&silent, Duration::from_secs(10)).complete("x", "p").await.is_none());

        let missing = CliCollaborator::new("/nonexistent/collaborator", vec![], Duration::from_secs(1));
        assert!(missing.complete("x", "p").await.is_none());
    }
}
