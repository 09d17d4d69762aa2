// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SemanticCache: request text to previously produced command
//!
//! `lookup` embeds the natural-language request, scans every stored entry for
//! the highest cosine similarity, and tiers the result with
//! [`SimilarityThresholds`]. `store` embeds the request and appends a new
//! entry under a fresh UUID; it never merges with or overwrites an existing
//! entry.
//!
//! The request text (not the translator's explanation) is what gets embedded,
//! so two phrasings of the same request land close together regardless of how
//! the translator described the command.
//!
//! `store` awaits the embedding before touching the repository, so a store
//! cancelled mid-way records nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{CacheEntry, CacheError, LookupOutcome, SimilarityThresholds, SimilarityTier};
use crate::infrastructure::{CacheEntryRepository, EmbeddingProvider};

#[async_trait]
pub trait SemanticCache: Send + Sync {
    async fn lookup(&self, request_text: &str) -> Result<LookupOutcome, CacheError>;

    /// Store a translation and return its new id.
    async fn store(&self, request_text: &str, command: &str, explanation: &str) -> Result<Uuid, CacheError>;

    /// Record that a cached entry was used (hit or validated near match).
    async fn record_hit(&self, id: Uuid) -> Result<bool, CacheError>;

    async fn count(&self) -> Result<usize, CacheError>;

    /// Remove entries not used within `max_idle_days`. Negative or
    /// unrepresentable periods are rejected with `InvalidRetention`.
    async fn cleanup_older_than(&self, max_idle_days: i64) -> Result<usize, CacheError>;
}

pub struct StandardSemanticCache {
    embeddings: Arc<dyn EmbeddingProvider>,
    repository: Arc<dyn CacheEntryRepository>,
    thresholds: SimilarityThresholds,
}

impl StandardSemanticCache {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, repository: Arc<dyn CacheEntryRepository>) -> Self {
        Self {
            embeddings,
            repository,
            thresholds: SimilarityThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: SimilarityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> SimilarityThresholds {
        self.thresholds
    }
}

#[async_trait]
impl SemanticCache for StandardSemanticCache {
    async fn lookup(&self, request_text: &str) -> Result<LookupOutcome, CacheError> {
        let query = self.embeddings.embed(request_text).await?;
        let Some((entry, similarity)) = self.repository.search_best(&query).await? else {
            debug!("Cache empty");
            return Ok(LookupOutcome::Miss);
        };

        let outcome = match self.thresholds.classify(similarity) {
            SimilarityTier::Hit => LookupOutcome::Hit {
                id: entry.id,
                command: entry.command,
                explanation: entry.explanation,
                similarity,
            },
            SimilarityTier::NearMatch => LookupOutcome::NearMatch {
                id: entry.id,
                command: entry.command,
                explanation: entry.explanation,
                similarity,
            },
            SimilarityTier::Miss => LookupOutcome::Miss,
        };
        debug!(similarity, hit = outcome.is_hit(), miss = outcome.is_miss(), "Cache lookup");
        Ok(outcome)
    }

    async fn store(&self, request_text: &str, command: &str, explanation: &str) -> Result<Uuid, CacheError> {
        let embedding = self.embeddings.embed(request_text).await?;
        let entry = CacheEntry::new(request_text, command, explanation, embedding);
        let id = entry.id;
        self.repository.insert(entry).await?;
        info!(id = %id, "Stored command in semantic cache");
        Ok(id)
    }

    async fn record_hit(&self, id: Uuid) -> Result<bool, CacheError> {
        self.repository.record_hit(id).await
    }

    async fn count(&self) -> Result<usize, CacheError> {
        self.repository.count().await
    }

    async fn cleanup_older_than(&self, max_idle_days: i64) -> Result<usize, CacheError> {
        let max_idle = Duration::try_days(max_idle_days)
            .filter(|d| *d >= Duration::zero())
            .ok_or(CacheError::InvalidRetention { days: max_idle_days })?;
        let removed = self.repository.cleanup_older_than(max_idle).await?;
        info!(removed, max_idle_days, "Cleaned up semantic cache");
        Ok(removed)
    }
}
