// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local filesystem side of `UPLOAD` / `DOWNLOAD`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::domain::execution::{FileTransfer, FileTransferError};
use crate::infrastructure::wire::MAX_TRANSFER_BYTES;

#[derive(Debug, Clone)]
pub struct LocalFileTransfer {
    allowed_roots: Vec<PathBuf>,
    max_file_bytes: u64,
}

impl Default for LocalFileTransfer {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            max_file_bytes: MAX_TRANSFER_BYTES,
        }
    }
}

impl LocalFileTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confine transfers to paths under `roots`. An empty list allows any path.
    pub fn with_allowed_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots: roots,
            ..Self::default()
        }
    }

    /// Refuse to read files larger than `bytes`. Defaults to what fits in one frame.
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes.min(MAX_TRANSFER_BYTES);
        self
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf, FileTransferError> {
        if raw.is_empty() {
            return Err(FileTransferError::InvalidRequest("empty path".to_string()));
        }
        let path = expand_home(raw);
        if self.allowed_roots.is_empty() {
            return Ok(path);
        }
        if !path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(FileTransferError::PermissionDenied(format!(
                "{} must be an absolute path without '..'",
                raw
            )));
        }
        if self.allowed_roots.iter().any(|root| path.starts_with(root)) {
            Ok(path)
        } else {
            Err(FileTransferError::PermissionDenied(format!(
                "{} is outside the allowed directories",
                raw
            )))
        }
    }
}

pub(crate) fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn parse_mode(mode: &str) -> Result<u32, FileTransferError> {
    let digits = mode.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| FileTransferError::InvalidRequest(format!("invalid file mode '{}'", mode)))
}

fn map_io(path: &Path, e: std::io::Error) -> FileTransferError {
    let shown = path.display().to_string();
    match e.kind() {
        ErrorKind::NotFound => FileTransferError::NotFound(shown),
        ErrorKind::PermissionDenied => FileTransferError::PermissionDenied(shown),
        _ => FileTransferError::Io(format!("{}: {}", shown, e)),
    }
}

#[async_trait]
impl FileTransfer for LocalFileTransfer {
    async fn write_file(&self, path: &str, data: &[u8], mode: &str) -> Result<u64, FileTransferError> {
        let mode = parse_mode(mode)?;
        let path = self.resolve(path)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| map_io(parent, e))?;
            }
        }
        tokio::fs::write(&path, data).await.map_err(|e| map_io(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| map_io(&path, e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        info!(path = %path.display(), bytes = data.len(), "File uploaded");
        Ok(data.len() as u64)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FileTransferError> {
        let path = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| map_io(&path, e))?;
        if !metadata.is_file() {
            return Err(FileTransferError::NotAFile(path.display().to_string()));
        }
        if metadata.len() > self.max_file_bytes {
            return Err(FileTransferError::TooLarge {
                path: path.display().to_string(),
                size: metadata.len(),
                limit: self.max_file_bytes,
            });
        }
        let data = tokio::fs::read(&path).await.map_err(|e| map_io(&path, e))?;
        info!(path = %path.display(), bytes = data.len(), "File downloaded");
        Ok(data)
    }
}
