// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-side record of a translated request.
///
/// Only `id -> command` ever leaves the client; the request text, the
/// explanation, and the embedding stay local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: Uuid,
    pub command: String,
    pub explanation: String,
    /// The natural-language request that was embedded.
    pub request_text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub hit_count: u64,
}

impl CacheEntry {
    /// New entry with a fresh UUID.
    pub fn new(
        request_text: impl Into<String>,
        command: impl Into<String>,
        explanation: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            explanation: explanation.into(),
            request_text: request_text.into(),
            embedding,
            created_at: now,
            last_used: now,
            hit_count: 0,
        }
    }

    pub fn record_hit(&mut self) {
        self.hit_count += 1;
        self.last_used = Utc::now();
    }
}
