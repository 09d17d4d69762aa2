// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Execution capabilities of an executor node.
//!
//! Process spawning and file I/O are external capabilities behind these
//! traits; the infrastructure layer provides the local implementations.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of running one shell command.
///
/// A nonzero `exit_code` is an ordinary result, not a protocol failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn completed(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            success: exit_code == 0,
            timed_out: false,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Command timed out after {} seconds", timeout.as_secs()),
            exit_code: -1,
            success: false,
            timed_out: true,
        }
    }

    pub fn failed_to_start(reason: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: reason.into(),
            exit_code: -1,
            success: false,
            timed_out: false,
        }
    }
}

/// A command ready to run on the executor host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSpec {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

/// `execute(command) -> ExecutionResult`.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, spec: ExecutionSpec) -> ExecutionResult;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileTransferError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("not a regular file: {0}")]
    NotAFile(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{path} is {size} bytes, over the {limit} byte transfer limit")]
    TooLarge { path: String, size: u64, limit: u64 },
    #[error("i/o error: {0}")]
    Io(String),
}

impl FileTransferError {
    /// Error code used in `ERROR` responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::NotAFile(_) => "FILE_NOT_FOUND",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::InvalidRequest(_) | Self::TooLarge { .. } => "INVALID_REQUEST",
            Self::Io(_) => "INTERNAL",
        }
    }
}

/// Binary blob transfer to and from the executor host.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Write `data` to `path`, creating parent directories, and apply `mode`
    /// (octal string such as `"0644"`). Returns the number of bytes written.
    async fn write_file(&self, path: &str, data: &[u8], mode: &str)
        -> Result<u64, FileTransferError>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FileTransferError>;
}
