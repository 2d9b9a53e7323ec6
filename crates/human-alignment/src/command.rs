//! External command execution
//!
//! Thin wrapper over `tokio::process::Command` that captures output and maps
//! spawn failures and non-zero exits onto [`AlignmentError`].

use crate::error::AlignmentError;
use crate::Result;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal)
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

/// Run `tool` with `args` and capture its output, regardless of exit status.
pub async fn run_tool(tool: &str, args: &[&str]) -> Result<CommandOutput> {
    debug!("Running: {} {}", tool, args.join(" "));

    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AlignmentError::ToolNotFound(tool.to_string()),
            _ => AlignmentError::Io(e),
        })?;

    Ok(CommandOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run `tool` with `args`, failing on a non-zero exit.
pub async fn run_checked(tool: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = run_tool(tool, args).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(AlignmentError::CommandFailed {
            tool: tool.to_string(),
            status: output.status,
            stderr: output.stderr,
        })
    }
}

/// Check whether `tool --version` runs successfully.
pub async fn is_tool_available(tool: &str) -> bool {
    matches!(run_tool(tool, &["--version"]).await, Ok(o) if o.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_maps_to_not_found() {
        let err = run_tool("definitely-not-a-real-tool-4c1e", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AlignmentError::ToolNotFound(_)));
        assert!(!is_tool_available("definitely-not-a-real-tool-4c1e").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let err = run_checked("sh", &["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            AlignmentError::CommandFailed {
                tool,
                status,
                stderr,
            } => {
                assert_eq!(tool, "sh");
                assert_eq!(status, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let out = run_checked("sh", &["-c", "printf hello"]).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_lossy(), "hello");
    }
}
