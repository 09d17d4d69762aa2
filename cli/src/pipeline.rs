// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cache-first execution of a natural-language request.
//!
//! ```text
//! lookup(request)
//!   Hit ─────────────────────┐
//!   NearMatch ─ validator ok ┤─▶ CACHE_LOOKUP(id) ─ CACHE_HIT  ─▶ COMMAND(remote copy)
//!             └ rejected ─┐  │                     └ CACHE_MISS ─▶ CACHE_STORE_EXEC(id, command)
//!   Miss ─────────────────┴─▶ translate ─▶ store ─▶ CACHE_STORE_EXEC(new id, command)
//! ```
//!
//! An unavailable embedding service degrades to the Miss path; the command is
//! then sent under a fresh id that is not recorded locally.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use uuid::Uuid;

use sigrelay_core::application::RemoteSession;
use sigrelay_core::domain::execution::ExecutionResult;
use sigrelay_core::domain::message::{CacheStoreExecRequest, CommandRequest};
use sigrelay_cortex::{LookupOutcome, SemanticCache, SuitabilityValidator, Translation, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Similarity at or above the exact threshold.
    CacheHit,
    /// Near match accepted by the validator.
    ValidatedNearMatch,
    Translated,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub key: Uuid,
    pub command: String,
    pub explanation: String,
    pub source: CommandSource,
    pub result: ExecutionResult,
}

/// Execution options forwarded with every request.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub cwd: Option<String>,
    /// `0` lets the executor apply its default.
    pub timeout_secs: u64,
}

pub struct CachePipeline<'a> {
    cache: &'a dyn SemanticCache,
    translator: &'a dyn Translator,
    validator: &'a dyn SuitabilityValidator,
}

impl<'a> CachePipeline<'a> {
    pub fn new(
        cache: &'a dyn SemanticCache,
        translator: &'a dyn Translator,
        validator: &'a dyn SuitabilityValidator,
    ) -> Self {
        Self {
            cache,
            translator,
            validator,
        }
    }

    pub async fn run<T>(
        &self,
        session: &mut RemoteSession<T>,
        request: &str,
        history: &[String],
        options: &ExecutionOptions,
    ) -> Result<PipelineOutcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let outcome = match self.cache.lookup(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                LookupOutcome::Miss
            }
        };

        let reused = match outcome {
            LookupOutcome::Hit {
                id,
                command,
                explanation,
                similarity,
            } => {
                info!(id = %id, similarity, "Cache hit");
                Some((id, command, explanation, CommandSource::CacheHit))
            }
            LookupOutcome::NearMatch {
                id,
                command,
                explanation,
                similarity,
            } => {
                let suitable = self
                    .validator
                    .is_suitable(request, &command, &explanation)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Suitability check failed, rejecting near match");
                        false
                    });
                info!(id = %id, similarity, suitable, "Cache near match");
                suitable.then_some((id, command, explanation, CommandSource::ValidatedNearMatch))
            }
            LookupOutcome::Miss => None,
        };

        match reused {
            Some((id, command, explanation, source)) => {
                if let Err(e) = self.cache.record_hit(id).await {
                    warn!(error = %e, "Failed to record cache hit");
                }
                self.run_cached(session, id, command, explanation, source, options).await
            }
            None => self.run_translated(session, request, history, options).await,
        }
    }

    async fn run_cached<T>(
        &self,
        session: &mut RemoteSession<T>,
        key: Uuid,
        command: String,
        explanation: String,
        source: CommandSource,
        options: &ExecutionOptions,
    ) -> Result<PipelineOutcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let remote = session.cache_lookup(key).await.context("Remote cache lookup failed")?;
        let (command, result) = match remote {
            Some(remote_command) => {
                if remote_command != command {
                    warn!(key = %key, "Remote cache holds a different command; running the remote copy");
                }
                let request = CommandRequest {
                    command: remote_command.clone(),
                    cwd: options.cwd.clone(),
                    timeout_secs: options.timeout_secs,
                };
                let result = session.execute_command(request).await.context("Remote execution failed")?;
                (remote_command, result)
            }
            None => {
                info!(key = %key, "Remote cache miss, storing command remotely");
                let result = store_exec(session, key, &command, &explanation, options).await?;
                (command, result)
            }
        };
        Ok(PipelineOutcome {
            key,
            command,
            explanation,
            source,
            result,
        })
    }

    async fn run_translated<T>(
        &self,
        session: &mut RemoteSession<T>,
        request: &str,
        history: &[String],
        options: &ExecutionOptions,
    ) -> Result<PipelineOutcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let Translation { command, explanation } = self
            .translator
            .translate(request, history)
            .await
            .context("Translation failed")?;
        let key = match self.cache.store(request, &command, &explanation).await {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Failed to store command in local cache");
                Uuid::new_v4()
            }
        };
        let result = store_exec(session, key, &command, &explanation, options).await?;
        Ok(PipelineOutcome {
            key,
            command,
            explanation,
            source: CommandSource::Translated,
            result,
        })
    }
}

async fn store_exec<T>(
    session: &mut RemoteSession<T>,
    key: Uuid,
    command: &str,
    explanation: &str,
    options: &ExecutionOptions,
) -> Result<ExecutionResult>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let request = CacheStoreExecRequest {
        key: key.to_string(),
        command: command.to_string(),
        explanation: explanation.to_string(),
        cwd: options.cwd.clone(),
        timeout_secs: options.timeout_secs,
    };
    session
        .cache_store_exec(request)
        .await
        .context("Remote store-and-execute failed")
}

/// Translator that returns a command given up front (`--command`).
#[derive(Debug, Clone)]
pub struct StaticTranslator {
    translation: Option<Translation>,
}

impl StaticTranslator {
    pub fn new(command: Option<String>, explanation: Option<String>) -> Self {
        Self {
            translation: command.map(|command| Translation {
                explanation: explanation.unwrap_or_else(|| command.clone()),
                command,
            }),
        }
    }
}

#[async_trait]
impl Translator for StaticTranslator {
    async fn translate(&self, request: &str, _history: &[String]) -> Result<Translation> {
        self.translation.clone().with_context(|| {
            format!(
                "No cached command for '{}'; pass --command to supply the translation",
                request
            )
        })
    }
}
