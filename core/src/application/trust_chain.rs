// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Trust Chain
//!
//! Delegated trust across relay hops. Each [`TrustHop`] pairs a verify side
//! (the keys of its immediate predecessors) with a sign side (its own key):
//!
//! ```text
//! client ──sign(client)──▶ hop 1: verify(client) + admit ─ re-sign(relay-a)
//!                          hop 2: verify(relay-a) + admit ─ re-sign(relay-b)
//!                          server: verify(relay-b)
//! ```
//!
//! A re-signed message keeps `type` and the payload document byte-for-byte
//! and gets a new `sender_id`, `timestamp` and `nonce`. The next hop only
//! needs this hop's key, never the original sender's. A message that fails
//! verification at any hop is rejected there and goes no further.

use std::sync::Arc;

use crate::domain::error::ProtocolError;
use crate::domain::identity::{KeyRing, MessageSigner};
use crate::domain::message::{Body, Message, Signable};
use crate::domain::replay::{Clock, ReplayPolicy};
use crate::infrastructure::audit::SecurityAuditLog;
use crate::infrastructure::replay_guard::ReplayGuard;

use super::gate::{MessageGate, SigningContext};

pub struct TrustHop {
    context: SigningContext,
}

impl TrustHop {
    pub fn new(context: SigningContext) -> Self {
        Self { context }
    }

    /// A hop that verifies with `verify_keys` and re-signs with `signer`,
    /// using its own replay guard.
    pub fn from_keys(
        verify_keys: KeyRing,
        signer: Arc<dyn MessageSigner>,
        policy: ReplayPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gate = MessageGate::new(
            verify_keys,
            Arc::new(ReplayGuard::new(policy)),
            clock,
            SecurityAuditLog::new(signer.sender_id()),
        );
        Self::new(SigningContext::new(signer, Arc::new(gate)))
    }

    pub fn identity(&self) -> &str {
        self.context.sender_id()
    }

    /// Verify and admit `inbound`, then re-sign it under this hop's identity.
    pub fn relay(&self, inbound: &Message) -> Result<Message, ProtocolError> {
        self.context.gate.check(inbound)?;
        self.resign(inbound.body().clone())
    }

    /// Re-sign a body whose message was already verified and admitted.
    pub fn resign(&self, body: Body) -> Result<Message, ProtocolError> {
        let message = self.context.seal(body)?;
        tracing::debug!(
            hop = self.identity(),
            message_type = %message.message_type(),
            "Re-signed message for next hop"
        );
        Ok(message)
    }
}

/// Ordered list of hops between a sender and its final receiver.
#[derive(Default)]
pub struct TrustChain {
    hops: Vec<TrustHop>,
}

impl TrustChain {
    pub fn new(hops: Vec<TrustHop>) -> Self {
        Self { hops }
    }

    pub fn push(&mut self, hop: TrustHop) {
        self.hops.push(hop);
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn identities(&self) -> Vec<&str> {
        self.hops.iter().map(TrustHop::identity).collect()
    }

    /// Pass `message` through every hop in order. Returns the message as the
    /// last hop signed it, or the first rejection.
    pub fn forward(&self, message: Message) -> Result<Message, ProtocolError> {
        self.hops
            .iter()
            .try_fold(message, |current, hop| hop.relay(&current))
    }
}
