// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Audit Log
//!
//! Emits a structured `warn!` record for every inbound message rejected
//! before reaching a handler. Records carry enough context to tell clock skew
//! from key mismatch (`skew_secs`, `sender_id`, `scheme`) but never include
//! key material or signature bytes.

use tracing::warn;

use crate::domain::error::{ProtocolError, ReplayKind};
use crate::domain::message::{Message, Signable};

#[derive(Debug, Clone, Default)]
pub struct SecurityAuditLog {
    node_id: String,
}

impl SecurityAuditLog {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }

    /// Record the rejection of a decoded message.
    pub fn rejected(&self, message: &Message, now: i64, error: &ProtocolError) {
        let skew_secs = now.abs_diff(message.timestamp());
        match error {
            ProtocolError::AuthenticationFailure(detail) => warn!(
                node = %self.node_id,
                sender_id = message.sender_id(),
                message_type = %message.message_type(),
                scheme = %message.signature().scheme(),
                skew_secs,
                detail = %detail,
                "Rejected message: authentication failure"
            ),
            ProtocolError::ReplayRejected { kind: ReplayKind::Stale, .. } => warn!(
                node = %self.node_id,
                sender_id = message.sender_id(),
                message_type = %message.message_type(),
                timestamp = message.timestamp(),
                now,
                skew_secs,
                "Rejected message: stale timestamp (check clock skew between hops)"
            ),
            ProtocolError::ReplayRejected { kind: ReplayKind::Duplicate, .. } => warn!(
                node = %self.node_id,
                sender_id = message.sender_id(),
                message_type = %message.message_type(),
                nonce = %message.nonce(),
                skew_secs,
                "Rejected message: duplicate nonce (possible replay)"
            ),
            other => warn!(
                node = %self.node_id,
                sender_id = message.sender_id(),
                message_type = %message.message_type(),
                error = %other,
                "Rejected message"
            ),
        }
    }

    /// Record a frame that could not be decoded into a message at all.
    pub fn undecodable(&self, peer: &str, error: &ProtocolError) {
        warn!(node = %self.node_id, peer, error = %error, "Rejected frame: protocol violation");
    }
}
