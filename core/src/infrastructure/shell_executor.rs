// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local shell execution for executor nodes (`sh -c <command>`).

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::execution::{CommandExecutor, ExecutionResult, ExecutionSpec};

/// Output beyond this many bytes per stream is dropped.
pub const MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, spec: ExecutionSpec) -> ExecutionResult {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to spawn shell");
                return ExecutionResult::failed_to_start(format!("failed to spawn shell: {}", e));
            }
        };
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = async {
            tokio::join!(read_capped(stdout), read_capped(stderr), child.wait())
        };
        // Dropping the child on timeout kills it
        match tokio::time::timeout(spec.timeout, finished).await {
            Ok((Ok(stdout), Ok(stderr), Ok(status))) => {
                let exit_code = status.code().unwrap_or(-1);
                if stdout.dropped > 0 || stderr.dropped > 0 {
                    warn!(
                        stdout_dropped = stdout.dropped,
                        stderr_dropped = stderr.dropped,
                        limit = MAX_OUTPUT_BYTES,
                        "Command output truncated"
                    );
                }
                debug!(exit_code, "Command finished");
                ExecutionResult::completed(stdout.into_string(), stderr.into_string(), exit_code)
            }
            Ok((stdout, stderr, status)) => {
                let error = stdout.err().or(stderr.err()).or(status.err());
                ExecutionResult::failed_to_start(format!(
                    "failed to wait for command: {}",
                    error.map(|e| e.to_string()).unwrap_or_default()
                ))
            }
            Err(_) => {
                warn!(timeout_secs = spec.timeout.as_secs(), "Command timed out");
                ExecutionResult::timed_out(spec.timeout)
            }
        }
    }
}

struct Captured {
    bytes: Vec<u8>,
    dropped: u64,
}

impl Captured {
    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Keep the first [`MAX_OUTPUT_BYTES`] of `pipe` and discard the rest, reading
/// to EOF so the child never blocks on a full pipe.
async fn read_capped<R>(pipe: Option<R>) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(Captured {
            bytes: Vec::new(),
            dropped: 0,
        });
    };
    let mut bytes = Vec::new();
    (&mut pipe).take(MAX_OUTPUT_BYTES as u64).read_to_end(&mut bytes).await?;
    let dropped = tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(Captured { bytes, dropped })
}
