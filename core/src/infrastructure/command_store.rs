// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remote command store implementations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::command_store::{CommandStoreError, RemoteCommandStore, StoreOutcome, StoredCommand};

/// In-memory store; contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommandStore {
    commands: Arc<RwLock<HashMap<Uuid, StoredCommand>>>,
}

impl InMemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteCommandStore for InMemoryCommandStore {
    async fn put(&self, key: Uuid, command: &str) -> Result<StoreOutcome, CommandStoreError> {
        let mut commands = self.commands.write();
        match commands.get(&key) {
            Some(existing) if existing.command == command => Ok(StoreOutcome::AlreadyPresent),
            Some(existing) => Ok(StoreOutcome::Conflict {
                existing: existing.command.clone(),
            }),
            None => {
                commands.insert(key, StoredCommand::new(key, command));
                Ok(StoreOutcome::Stored)
            }
        }
    }

    async fn get(&self, key: Uuid) -> Result<Option<StoredCommand>, CommandStoreError> {
        let mut commands = self.commands.write();
        Ok(commands.get_mut(&key).map(|entry| {
            *entry = entry.clone().touched();
            entry.clone()
        }))
    }

    async fn delete(&self, key: Uuid) -> Result<bool, CommandStoreError> {
        Ok(self.commands.write().remove(&key).is_some())
    }

    async fn count(&self) -> Result<usize, CommandStoreError> {
        Ok(self.commands.read().len())
    }

    async fn cleanup_older_than(&self, max_idle: Duration) -> Result<usize, CommandStoreError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return Ok(0);
        };
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|_, entry| entry.last_used >= cutoff);
        Ok(before - commands.len())
    }
}

impl From<sled::Error> for CommandStoreError {
    fn from(err: sled::Error) -> Self {
        CommandStoreError::Database(err.to_string())
    }
}

/// Durable store backed by a `sled` tree of JSON-encoded [`StoredCommand`]s.
#[derive(Clone)]
pub struct SledCommandStore {
    tree: sled::Tree,
}

impl SledCommandStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CommandStoreError> {
        let db = sled::open(path.as_ref())?;
        let tree = db.open_tree("commands")?;
        info!(path = %path.as_ref().display(), entries = tree.len(), "Opened command store");
        Ok(Self { tree })
    }

    fn decode(bytes: &[u8]) -> Result<StoredCommand, CommandStoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait]
impl RemoteCommandStore for SledCommandStore {
    async fn put(&self, key: Uuid, command: &str) -> Result<StoreOutcome, CommandStoreError> {
        let encoded = serde_json::to_vec(&StoredCommand::new(key, command))?;
        let outcome = loop {
            let swapped = self
                .tree
                .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(encoded.as_slice()))?;
            match swapped {
                Ok(()) => break StoreOutcome::Stored,
                Err(sled::CompareAndSwapError {
                    current: Some(current),
                    ..
                }) => {
                    let existing = Self::decode(&current)?;
                    break if existing.command == command {
                        StoreOutcome::AlreadyPresent
                    } else {
                        StoreOutcome::Conflict {
                            existing: existing.command,
                        }
                    };
                }
                // removed after the swap was refused
                Err(_) => continue,
            }
        };
        if outcome == StoreOutcome::Stored {
            self.tree.flush_async().await?;
        }
        debug!(%key, ?outcome, "Command store put");
        Ok(outcome)
    }

    async fn get(&self, key: Uuid) -> Result<Option<StoredCommand>, CommandStoreError> {
        let updated = self.tree.update_and_fetch(key.as_bytes(), |old| {
            old.map(|bytes| match serde_json::from_slice::<StoredCommand>(bytes) {
                Ok(entry) => serde_json::to_vec(&entry.touched()).unwrap_or_else(|_| bytes.to_vec()),
                Err(_) => bytes.to_vec(),
            })
        })?;
        updated.map(|bytes| Self::decode(&bytes)).transpose()
    }

    async fn delete(&self, key: Uuid) -> Result<bool, CommandStoreError> {
        let removed = self.tree.remove(key.as_bytes())?.is_some();
        if removed {
            self.tree.flush_async().await?;
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, CommandStoreError> {
        Ok(self.tree.len())
    }

    async fn cleanup_older_than(&self, max_idle: Duration) -> Result<usize, CommandStoreError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return Ok(0);
        };
        let mut stale = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            if Self::decode(&value)?.last_used < cutoff {
                stale.push(key);
            }
        }
        for key in &stale {
            self.tree.remove(key)?;
        }
        if !stale.is_empty() {
            self.tree.flush_async().await?;
            info!(removed = stale.len(), "Cleaned up idle cached commands");
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn exercise(store: &dyn RemoteCommandStore) {
        let key = Uuid::new_v4();
        assert_eq!(store.put(key, "ls -la").await.unwrap(), StoreOutcome::Stored);
        assert_eq!(store.put(key, "ls -la").await.unwrap(), StoreOutcome::AlreadyPresent);
        assert_eq!(
            store.put(key, "rm -rf /").await.unwrap(),
            StoreOutcome::Conflict {
                existing: "ls -la".to_string()
            }
        );

        let first = store.get(key).await.unwrap().unwrap();
        assert_eq!(first.command, "ls -la");
        assert_eq!(first.use_count, 1);
        assert_eq!(store.get(key).await.unwrap().unwrap().use_count, 2);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.cleanup_older_than(Duration::days(30)).await.unwrap(), 0);
        assert_eq!(store.cleanup_older_than(Duration::seconds(-1)).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.delete(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise(&InMemoryCommandStore::new()).await;
    }

    #[tokio::test]
    async fn test_sled_store() {
        let dir = tempdir().unwrap();
        exercise(&SledCommandStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn test_sled_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let key = Uuid::new_v4();
        {
            let store = SledCommandStore::open(dir.path()).unwrap();
            store.put(key, "uptime").await.unwrap();
        }
        let store = SledCommandStore::open(dir.path()).unwrap();
        assert_eq!(store.get(key).await.unwrap().unwrap().command, "uptime");
    }

    #[tokio::test]
    async fn test_retention_out_of_range_removes_nothing() {
        let store = InMemoryCommandStore::new();
        store.put(Uuid::new_v4(), "uptime").await.unwrap();
        let max_idle = Duration::try_days(1_000_000_000).unwrap();
        assert_eq!(store.cleanup_older_than(max_idle).await.unwrap(), 0);
        assert_eq!(store.cleanup_older_than_days(1_000_000_000).await.unwrap(), 0);
        assert!(matches!(
            store.cleanup_older_than_days(i64::MAX).await,
            Err(CommandStoreError::InvalidRetention { .. })
        ));
        assert!(matches!(
            store.cleanup_older_than_days(-3).await,
            Err(CommandStoreError::InvalidRetention { days: -3 })
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_sled_put_racing_delete_never_reports_conflict() {
        let dir = tempdir().unwrap();
        let store = SledCommandStore::open(dir.path()).unwrap();
        let key = Uuid::new_v4();
        let deleter = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    tokio_test::block_on(store.delete(key)).unwrap();
                }
            })
        };
        for _ in 0..100 {
            let outcome = tokio_test::block_on(store.put(key, "uptime")).unwrap();
            assert!(
                matches!(outcome, StoreOutcome::Stored | StoreOutcome::AlreadyPresent),
                "unexpected {:?}",
                outcome
            );
        }
        deleter.join().unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_puts_same_key_one_winner() {
        let store = Arc::new(InMemoryCommandStore::new());
        let key = Uuid::new_v4();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.put(key, &format!("cmd {}", i)).await.unwrap() }));
        }
        let mut stored = 0;
        for h in handles {
            if h.await.unwrap() == StoreOutcome::Stored {
                stored += 1;
            }
        }
        assert_eq!(stored, 1);
    }
}
