// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Similarity Policy
//!
//! Three confidence regimes over the best cosine similarity found:
//!
//! | Similarity | Outcome | Caller |
//! |------------|---------|--------|
//! | `>= exact` (0.99) | [`LookupOutcome::Hit`] | use the cached command as is |
//! | `>= near` (0.85) | [`LookupOutcome::NearMatch`] | validate suitability first |
//! | below | [`LookupOutcome::Miss`] | translate, then store |

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::CacheError;

pub const DEFAULT_EXACT_THRESHOLD: f64 = 0.99;
pub const DEFAULT_NEAR_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Hit {
        id: Uuid,
        command: String,
        explanation: String,
        similarity: f64,
    },
    NearMatch {
        id: Uuid,
        command: String,
        explanation: String,
        similarity: f64,
    },
    Miss,
}

impl LookupOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Tier a similarity falls into, before the entry is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityTier {
    Hit,
    NearMatch,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    pub exact: f64,
    pub near: f64,
}

impl SimilarityThresholds {
    pub fn new(exact: f64, near: f64) -> Result<Self, CacheError> {
        if !(near > 0.0 && near < exact && exact <= 1.0) {
            return Err(CacheError::InvalidThresholds { exact, near });
        }
        Ok(Self { exact, near })
    }

    /// Both bounds are inclusive.
    pub fn classify(&self, similarity: f64) -> SimilarityTier {
        if similarity >= self.exact {
            SimilarityTier::Hit
        } else if similarity >= self.near {
            SimilarityTier::NearMatch
        } else {
            SimilarityTier::Miss
        }
    }
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            exact: DEFAULT_EXACT_THRESHOLD,
            near: DEFAULT_NEAR_THRESHOLD,
        }
    }
}

/// Cosine similarity in `[-1, 1]`, accumulated in `f64`.
///
/// Returns `0.0` if either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
