// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the semantic cache

pub mod embedding_client;
pub mod repository;

pub use embedding_client::{EmbeddingProvider, HashEmbeddingClient, HttpEmbeddingClient};
pub use repository::{CacheEntryRepository, InMemoryCacheRepository, SledCacheRepository};
