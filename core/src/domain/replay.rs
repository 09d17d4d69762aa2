// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Replay admission vocabulary shared by the guard and its callers.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ProtocolError, ReplayKind};

/// Default validity window for message timestamps and nonces.
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    RejectedStale,
    RejectedDuplicate,
}

impl Admission {
    /// Convert a rejection into the typed error surfaced to callers.
    pub fn into_result(self, sender_id: &str, timestamp: i64, now: i64) -> Result<(), ProtocolError> {
        match self {
            Self::Accepted => Ok(()),
            Self::RejectedStale => Err(ProtocolError::ReplayRejected {
                kind: ReplayKind::Stale,
                detail: format!(
                    "timestamp {} from '{}' is {}s away from local clock",
                    timestamp,
                    sender_id,
                    now.abs_diff(timestamp)
                ),
            }),
            Self::RejectedDuplicate => Err(ProtocolError::ReplayRejected {
                kind: ReplayKind::Duplicate,
                detail: format!("nonce from '{}' already seen", sender_id),
            }),
        }
    }
}

/// A `(sender_id, nonce)` pair the guard has admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    pub sender_id: String,
    pub nonce: String,
    pub first_seen_at: i64,
    /// Last instant at which a message carrying this pair could still pass
    /// the freshness check.
    pub expires_at: i64,
}

/// Window and skew settings of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPolicy {
    /// How long an admitted nonce is remembered.
    pub window_secs: u64,
    /// Maximum accepted `|now - timestamp|`. Equal to the window unless
    /// configured otherwise.
    pub max_skew_secs: u64,
}

impl ReplayPolicy {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            max_skew_secs: window_secs,
        }
    }

    pub fn with_max_skew(mut self, max_skew_secs: u64) -> Self {
        self.max_skew_secs = max_skew_secs;
        self
    }
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_WINDOW_SECS)
    }
}

/// Source of "now" in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
