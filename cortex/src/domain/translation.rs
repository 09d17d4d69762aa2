// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! External collaborators of the cache pipeline: the natural-language
//! translator and the near-match suitability check. Both are opaque here.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub command: String,
    pub explanation: String,
}

/// `translate(request, history) -> (command, explanation)`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &str, history: &[String]) -> Result<Translation>;
}

/// Decides whether a near-match cached command fits a new request.
#[async_trait]
pub trait SuitabilityValidator: Send + Sync {
    async fn is_suitable(&self, request: &str, command: &str, explanation: &str) -> Result<bool>;
}

/// Accepts or rejects every near match without looking at it.
#[derive(Debug, Clone, Copy)]
pub struct FixedSuitability(pub bool);

#[async_trait]
impl SuitabilityValidator for FixedSuitability {
    async fn is_suitable(&self, _request: &str, _command: &str, _explanation: &str) -> Result<bool> {
        Ok(self.0)
    }
}
