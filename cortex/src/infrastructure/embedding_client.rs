// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! `embed(text) -> Vec<f32>` behind [`EmbeddingProvider`].
//!
//! - [`HttpEmbeddingClient`]: OpenAI-compatible `POST {endpoint}/embeddings`
//!   (OpenRouter by default).
//! - [`HashEmbeddingClient`]: deterministic offline vectors for tests and
//!   nodes without an API key. Identical text gives identical vectors; it
//!   carries no semantic meaning.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::EmbeddingError;

pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a, I: Serialize> {
    model: &'a str,
    input: I,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a client reading the API key from `api_key_env`.
    pub fn from_env(endpoint: &str, model: &str, api_key_env: &str) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| EmbeddingError::Authentication(format!("{} is not set", api_key_env)))?;
        Ok(Self::new(endpoint, api_key, model))
    }

    async fn request<I: Serialize + Send + Sync>(&self, input: I) -> Result<Vec<EmbeddingDatum>, EmbeddingError> {
        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status == 401 || status == 403 {
                EmbeddingError::Authentication(error_text)
            } else if status == 429 {
                EmbeddingError::RateLimit
            } else {
                EmbeddingError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        Ok(body.data)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.request(text)
            .await?
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut data = self.request(texts).await?;
        if data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic embeddings derived from SHA-256 of the normalised text.
#[derive(Debug, Clone)]
pub struct HashEmbeddingClient {
    dimensions: usize,
}

impl HashEmbeddingClient {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashEmbeddingClient {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let normalised = text.trim().to_lowercase();
        let mut out = Vec::with_capacity(self.dimensions);
        let mut block = 0u32;
        while out.len() < self.dimensions {
            let digest = Sha256::new()
                .chain_update(block.to_be_bytes())
                .chain_update(normalised.as_bytes())
                .finalize();
            out.extend(
                digest
                    .iter()
                    .take(self.dimensions - out.len())
                    .map(|b| f32::from(*b) / 127.5 - 1.0),
            );
            block += 1;
        }
        Ok(out)
    }
}
