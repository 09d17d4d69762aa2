// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Protocol Error Taxonomy
//!
//! Every failure of the signed-message protocol surfaces to the caller as a
//! [`ProtocolError`]. Nothing in this crate retries: the caller decides whether
//! to reconnect, prompt, or abort.
//!
//! A failed shell command is **not** an error here. It is an
//! [`crate::domain::execution::ExecutionResult`] with a nonzero exit code,
//! delivered in a normal `RESPONSE` message.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the replay guard refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayKind {
    /// Timestamp outside the accepted window (clock skew or an old capture).
    Stale,
    /// `(sender_id, nonce)` already seen inside the window.
    Duplicate,
}

impl std::fmt::Display for ReplayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stale => write!(f, "stale timestamp"),
            Self::Duplicate => write!(f, "duplicate nonce"),
        }
    }
}

/// Reason code carried by an `AUTH_ERROR` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    AuthenticationFailure,
    ReplayStale,
    ReplayDuplicate,
    ProtocolViolation,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthenticationFailure => "authentication_failure",
            Self::ReplayStale => "replay_stale",
            Self::ReplayDuplicate => "replay_duplicate",
            Self::ProtocolViolation => "protocol_violation",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Bad, missing, or unverifiable signature. Terminal for the message.
    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    #[error("replay rejected ({kind}): {detail}")]
    ReplayRejected { kind: ReplayKind, detail: String },

    /// Unknown message type, malformed payload, or an unexpected response.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The peer answered with an `AUTH_ERROR`.
    #[error("rejected by peer ({reason}): {message}")]
    RemoteRejected {
        reason: RejectionReason,
        message: String,
    },

    /// The peer answered with a handler-level `ERROR`.
    #[error("remote error {code}: {message}")]
    Remote { code: String, message: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl ProtocolError {
    /// Reason code to put in the `AUTH_ERROR` sent back for this failure.
    ///
    /// Returns `None` for errors that are not inbound rejections.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Self::AuthenticationFailure(_) => Some(RejectionReason::AuthenticationFailure),
            Self::ReplayRejected { kind: ReplayKind::Stale, .. } => Some(RejectionReason::ReplayStale),
            Self::ReplayRejected { kind: ReplayKind::Duplicate, .. } => {
                Some(RejectionReason::ReplayDuplicate)
            }
            Self::ProtocolViolation(_) => Some(RejectionReason::ProtocolViolation),
            _ => None,
        }
    }

    /// Transport-class failures leave the connection unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::Timeout(_))
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        Self::TransportFailure(e.to_string())
    }
}

/// Key material could not be loaded, parsed, or written.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {0} is not valid hex")]
    InvalidEncoding(String),

    #[error("key file {path} has {actual} bytes, expected {expected}")]
    InvalidLength {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid key: {0}")]
    Invalid(String),

    #[error("key file {0} already exists (use --force to overwrite)")]
    AlreadyExists(String),

    #[error("no key configured for {0}")]
    Missing(String),
}
