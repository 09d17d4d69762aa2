// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relay Service
//!
//! Handler of a relay node. The session shell has already verified and
//! admitted the inbound request against the relay's downstream keys; this
//! service re-signs it under the relay identity, forwards it upstream, and
//! hands the (verified) upstream reply body back to the shell, which signs it
//! again for the downstream peer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::error::ProtocolError;
use crate::domain::message::{error_codes, Body, Message, Signable};

use super::client::RemoteSession;
use super::gate::SigningContext;
use super::session::MessageHandler;
use super::trust_chain::TrustHop;

/// Idle connections to the next hop, reused across requests.
pub struct UpstreamPool {
    address: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    context: SigningContext,
    idle: Mutex<Vec<RemoteSession>>,
    max_idle: usize,
}

impl UpstreamPool {
    pub fn new(
        address: impl Into<String>,
        context: SigningContext,
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle: usize,
    ) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            request_timeout,
            context,
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    async fn checkout(&self) -> Result<RemoteSession, ProtocolError> {
        let reused = self.idle.lock().pop();
        match reused {
            Some(session) => Ok(session),
            None => {
                debug!(upstream = %self.address, "Opening upstream connection");
                RemoteSession::connect(
                    &self.address,
                    self.connect_timeout,
                    self.request_timeout,
                    self.context.clone(),
                )
                .await
            }
        }
    }

    fn checkin(&self, session: RemoteSession) {
        if session.is_poisoned() {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(session);
        }
    }

    /// Send a signed request upstream and return the verified reply.
    pub async fn forward(&self, request: Message) -> Result<Message, ProtocolError> {
        let mut session = self.checkout().await?;
        let result = session.forward(request).await;
        self.checkin(session);
        result
    }
}

pub struct RelayService {
    hop: TrustHop,
    upstream: Arc<UpstreamPool>,
}

impl RelayService {
    /// `downstream` is the context the session shell uses; its signer is the
    /// relay identity used for re-signing.
    pub fn new(downstream: SigningContext, upstream: Arc<UpstreamPool>) -> Self {
        Self {
            hop: TrustHop::new(downstream),
            upstream,
        }
    }
}

#[async_trait]
impl MessageHandler for RelayService {
    async fn handle(&self, request: Message) -> Body {
        let origin = request.sender_id().to_string();
        let message_type = request.message_type();

        let forwarded = match self.hop.resign(request.into_body()) {
            Ok(forwarded) => forwarded,
            Err(e) => return Body::error(error_codes::INTERNAL, e.to_string()),
        };

        match self.upstream.forward(forwarded).await {
            Ok(reply) => {
                debug!(
                    origin = %origin,
                    %message_type,
                    reply_type = %reply.message_type(),
                    upstream = %self.upstream.address(),
                    "Relayed request"
                );
                reply.into_body()
            }
            Err(e) if e.is_transport() => {
                warn!(upstream = %self.upstream.address(), error = %e, "Upstream unavailable");
                Body::error(error_codes::UPSTREAM_UNAVAILABLE, e.to_string())
            }
            Err(e) => {
                warn!(upstream = %self.upstream.address(), error = %e, "Upstream reply rejected");
                Body::error(error_codes::UPSTREAM_INVALID_RESPONSE, e.to_string())
            }
        }
    }
}
