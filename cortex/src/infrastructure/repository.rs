// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cache entry repositories.
//!
//! Entries are kept in creation order. [`CacheEntryRepository::search_best`]
//! is a linear scan; an approximate index can replace it behind the same
//! trait.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{cosine_similarity, CacheEntry, CacheError};

#[async_trait]
pub trait CacheEntryRepository: Send + Sync {
    /// Append an entry. Never overwrites.
    async fn insert(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Entry with the highest similarity to `query`. Exact ties go to the
    /// most recently created entry.
    async fn search_best(&self, query: &[f32]) -> Result<Option<(CacheEntry, f64)>, CacheError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CacheEntry>, CacheError>;

    /// Bump `hit_count` and `last_used`. Returns false if the id is unknown.
    async fn record_hit(&self, id: Uuid) -> Result<bool, CacheError>;

    async fn count(&self) -> Result<usize, CacheError>;

    /// Remove entries not used within `max_idle`.
    async fn cleanup_older_than(&self, max_idle: Duration) -> Result<usize, CacheError>;
}

/// Pick the best of `(entry, similarity)` pairs given in creation order.
fn best_match<'a>(query: &[f32], entries: impl Iterator<Item = &'a CacheEntry>) -> Option<(&'a CacheEntry, f64)> {
    let mut best: Option<(&CacheEntry, f64)> = None;
    for entry in entries {
        let similarity = cosine_similarity(query, &entry.embedding);
        // `>=` so that a later entry wins an exact tie
        if best.map_or(true, |(_, s)| similarity >= s) {
            best = Some((entry, similarity));
        }
    }
    best
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheRepository {
    entries: Arc<RwLock<Vec<CacheEntry>>>,
}

impl InMemoryCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheEntryRepository for InMemoryCacheRepository {
    async fn insert(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn search_best(&self, query: &[f32]) -> Result<Option<(CacheEntry, f64)>, CacheError> {
        let entries = self.entries.read();
        Ok(best_match(query, entries.iter()).map(|(e, s)| (e.clone(), s)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.read().iter().find(|e| e.id == id).cloned())
    }

    async fn record_hit(&self, id: Uuid) -> Result<bool, CacheError> {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.record_hit();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().len())
    }

    async fn cleanup_older_than(&self, max_idle: Duration) -> Result<usize, CacheError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return Ok(0);
        };
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.last_used >= cutoff);
        Ok(before - entries.len())
    }
}

/// Durable repository on a `sled` tree keyed by a monotonically increasing
/// sequence number, so iteration order is creation order.
pub struct SledCacheRepository {
    entries: sled::Tree,
    ids: sled::Tree,
    db: sled::Db,
}

impl SledCacheRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = sled::open(path.as_ref())?;
        let entries = db.open_tree("entries")?;
        let ids = db.open_tree("ids")?;
        debug!(path = %path.as_ref().display(), entries = entries.len(), "Opened cache index");
        Ok(Self { entries, ids, db })
    }

    fn load(bytes: &[u8]) -> Result<CacheEntry, CacheError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn sequence_of(&self, id: Uuid) -> Result<Option<sled::IVec>, CacheError> {
        Ok(self.ids.get(id.as_bytes())?)
    }
}

#[async_trait]
impl CacheEntryRepository for SledCacheRepository {
    async fn insert(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let seq = self.db.generate_id()?.to_be_bytes();
        let value = serde_json::to_vec(&entry)?;
        self.entries.insert(seq, value)?;
        self.ids.insert(entry.id.as_bytes(), seq.to_vec())?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn search_best(&self, query: &[f32]) -> Result<Option<(CacheEntry, f64)>, CacheError> {
        let mut loaded = Vec::with_capacity(self.entries.len());
        for item in self.entries.iter() {
            let (_, value) = item?;
            loaded.push(Self::load(&value)?);
        }
        Ok(best_match(query, loaded.iter()).map(|(e, s)| (e.clone(), s)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CacheEntry>, CacheError> {
        let Some(seq) = self.sequence_of(id)? else {
            return Ok(None);
        };
        match self.entries.get(seq)? {
            Some(value) => Ok(Some(Self::load(&value)?)),
            None => Ok(None),
        }
    }

    async fn record_hit(&self, id: Uuid) -> Result<bool, CacheError> {
        let Some(seq) = self.sequence_of(id)? else {
            return Ok(false);
        };
        let mut failure = None;
        let updated = self.entries.update_and_fetch(seq, |old| {
            let old = old?;
            match Self::load(old) {
                Ok(mut entry) => {
                    entry.record_hit();
                    match serde_json::to_vec(&entry) {
                        Ok(bytes) => Some(bytes),
                        Err(e) => {
                            failure = Some(CacheError::from(e));
                            Some(old.to_vec())
                        }
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    Some(old.to_vec())
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(updated.is_some())
    }

    async fn count(&self) -> Result<usize, CacheError> {
        Ok(self.entries.len())
    }

    async fn cleanup_older_than(&self, max_idle: Duration) -> Result<usize, CacheError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return Ok(0);
        };
        let mut stale = Vec::new();
        for item in self.entries.iter() {
            let (seq, value) = item?;
            let entry = Self::load(&value)?;
            if entry.last_used < cutoff {
                stale.push((seq, entry.id));
            }
        }
        for (seq, id) in &stale {
            self.entries.remove(seq)?;
            self.ids.remove(id.as_bytes())?;
        }
        if !stale.is_empty() {
            self.db.flush_async().await?;
        }
        Ok(stale.len())
    }
}
