// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("invalid similarity thresholds: exact={exact}, near={near} (need 0 < near < exact <= 1)")]
    InvalidThresholds { exact: f64, near: f64 },

    #[error("invalid retention period: {days} days")]
    InvalidRetention { days: i64 },
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for CacheError {
    fn from(err: sled::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}
