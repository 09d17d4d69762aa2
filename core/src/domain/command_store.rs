// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remote Command Store
//!
//! Executor-side key-value store mapping a cache UUID to the command text the
//! client sent alongside it. It never sees the natural-language request or an
//! embedding, only `id -> command`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryCommandStore` | `Arc<RwLock<HashMap>>`, tests and ephemeral nodes |
//! | `SledCommandStore` | `sled` tree, durable across restarts |

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommand {
    pub key: Uuid,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub use_count: u64,
}

impl StoredCommand {
    pub fn new(key: Uuid, command: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key,
            command: command.into(),
            created_at: now,
            last_used: now,
            use_count: 0,
        }
    }

    pub fn touched(mut self) -> Self {
        self.use_count += 1;
        self.last_used = Utc::now();
        self
    }
}

/// Result of [`RemoteCommandStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// Same key and same command were already stored.
    AlreadyPresent,
    /// The key is taken by a different command; nothing was written.
    Conflict { existing: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CommandStoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid retention period: {days} days")]
    InvalidRetention { days: i64 },
}

impl From<serde_json::Error> for CommandStoreError {
    fn from(err: serde_json::Error) -> Self {
        CommandStoreError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait RemoteCommandStore: Send + Sync {
    /// Insert `key -> command` unless the key is already taken. Atomic.
    async fn put(&self, key: Uuid, command: &str) -> Result<StoreOutcome, CommandStoreError>;

    /// Look up a key and record the use.
    async fn get(&self, key: Uuid) -> Result<Option<StoredCommand>, CommandStoreError>;

    async fn delete(&self, key: Uuid) -> Result<bool, CommandStoreError>;

    async fn count(&self) -> Result<usize, CommandStoreError>;

    /// Remove entries not used within `max_idle`. Returns how many were removed.
    async fn cleanup_older_than(&self, max_idle: Duration) -> Result<usize, CommandStoreError>;

    /// [`cleanup_older_than`](Self::cleanup_older_than) in whole days. Negative
    /// or unrepresentable periods are refused.
    async fn cleanup_older_than_days(&self, days: i64) -> Result<usize, CommandStoreError> {
        let max_idle = Duration::try_days(days)
            .filter(|d| *d >= Duration::zero())
            .ok_or(CommandStoreError::InvalidRetention { days })?;
        self.cleanup_older_than(max_idle).await
    }
}
