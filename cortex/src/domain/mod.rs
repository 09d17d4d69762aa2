// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache_entry;
pub mod error;
pub mod similarity;
pub mod translation;

pub use cache_entry::CacheEntry;
pub use error::{CacheError, EmbeddingError};
pub use similarity::{cosine_similarity, LookupOutcome, SimilarityThresholds, SimilarityTier};
pub use translation::{FixedSuitability, SuitabilityValidator, Translation, Translator};
