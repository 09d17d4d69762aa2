// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Replay Guard
//!
//! Remembers admitted `(sender_id, nonce)` pairs for as long as a message
//! carrying them could still pass the freshness check, then forgets them.
//!
//! ## Invariants
//!
//! - `admit` is a single critical section: check-then-insert cannot race.
//! - A pair is kept until `max(first_seen_at + window, timestamp + max_skew)`,
//!   so a replay is either a duplicate or stale, never accepted.
//! - Memory is bounded by the number of messages admitted per window.
//!   Expired records are evicted on every `admit` and by [`ReplaySweeper`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::replay::{Admission, Clock, ReplayPolicy, ReplayRecord};

type PairKey = (String, String);

#[derive(Default)]
struct Ledger {
    records: HashMap<PairKey, ReplayRecord>,
    by_expiry: BTreeSet<(i64, PairKey)>,
}

impl Ledger {
    fn evict_expired(&mut self, now: i64) -> usize {
        let mut evicted = 0;
        while let Some((expires_at, _)) = self.by_expiry.first() {
            if *expires_at >= now {
                break;
            }
            if let Some((_, key)) = self.by_expiry.pop_first() {
                self.records.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

pub struct ReplayGuard {
    policy: ReplayPolicy,
    ledger: Mutex<Ledger>,
}

impl ReplayGuard {
    pub fn new(policy: ReplayPolicy) -> Self {
        Self {
            policy,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    pub fn admit(&self, sender_id: &str, nonce: &str, timestamp: i64, now: i64) -> Admission {
        if now.abs_diff(timestamp) > self.policy.max_skew_secs {
            return Admission::RejectedStale;
        }

        let key = (sender_id.to_string(), nonce.to_string());
        let skew = i64::try_from(self.policy.max_skew_secs).unwrap_or(i64::MAX);
        let window = i64::try_from(self.policy.window_secs).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(window).max(timestamp.saturating_add(skew));

        let mut ledger = self.ledger.lock();
        ledger.evict_expired(now);
        if ledger.records.contains_key(&key) {
            return Admission::RejectedDuplicate;
        }
        ledger.by_expiry.insert((expires_at, key.clone()));
        ledger.records.insert(
            key,
            ReplayRecord {
                sender_id: sender_id.to_string(),
                nonce: nonce.to_string(),
                first_seen_at: now,
                expires_at,
            },
        );
        Admission::Accepted
    }

    /// Drop every record that can no longer match a fresh message.
    pub fn sweep(&self, now: i64) -> usize {
        self.ledger.lock().evict_expired(now)
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background task that periodically calls [`ReplayGuard::sweep`].
pub struct ReplaySweeper {
    guard: Arc<ReplayGuard>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl ReplaySweeper {
    pub fn new(guard: Arc<ReplayGuard>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            guard,
            clock,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Starting replay sweeper");
        let mut tick = interval(self.interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let evicted = self.guard.sweep(self.clock.now());
                    if evicted > 0 {
                        debug!(evicted, remaining = self.guard.len(), "Replay sweep completed");
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping replay sweeper");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::replay::ManualClock;

    const T0: i64 = 1_700_000_000;

    #[test]
    fn test_first_admit_accepted_then_duplicate() {
        let guard = ReplayGuard::new(ReplayPolicy::default());
        assert_eq!(guard.admit("client", "n1", T0, T0), Admission::Accepted);
        assert_eq!(guard.admit("client", "n1", T0, T0 + 10), Admission::RejectedDuplicate);
        assert_eq!(guard.admit("client", "n1", T0, T0 + 300), Admission::RejectedDuplicate);
    }

    #[test]
    fn test_same_nonce_different_sender_is_independent() {
        let guard = ReplayGuard::new(ReplayPolicy::default());
        assert_eq!(guard.admit("client", "n1", T0, T0), Admission::Accepted);
        assert_eq!(guard.admit("relay", "n1", T0, T0), Admission::Accepted);
    }

    #[test]
    fn test_stale_in_both_directions() {
        let guard = ReplayGuard::new(ReplayPolicy::default());
        assert_eq!(guard.admit("c", "a", T0 - 301, T0), Admission::RejectedStale);
        assert_eq!(guard.admit("c", "b", T0 + 301, T0), Admission::RejectedStale);
        assert_eq!(guard.admit("c", "c", T0 - 300, T0), Admission::Accepted);
        assert_eq!(guard.admit("c", "d", T0 + 300, T0), Admission::Accepted);
        // stale messages are not recorded
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_pair_accepted_again_after_window() {
        let guard = ReplayGuard::new(ReplayPolicy::default());
        assert_eq!(guard.admit("client", "n1", T0, T0), Admission::Accepted);
        let later = T0 + 301;
        assert_eq!(guard.admit("client", "n1", later, later), Admission::Accepted);
    }

    #[test]
    fn test_future_timestamp_kept_until_it_goes_stale() {
        let guard = ReplayGuard::new(ReplayPolicy::new(60));
        let ts = T0 + 60;
        assert_eq!(guard.admit("c", "n", ts, T0), Admission::Accepted);
        // first_seen + window has passed but the message itself is still fresh
        assert_eq!(guard.admit("c", "n", ts, T0 + 100), Admission::RejectedDuplicate);
        assert_eq!(guard.admit("c", "n", ts, T0 + 121), Admission::RejectedStale);
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let guard = ReplayGuard::new(ReplayPolicy::default());
        assert_eq!(guard.admit("c", "a", i64::MIN, T0), Admission::RejectedStale);
        assert_eq!(guard.admit("c", "b", i64::MAX, T0), Admission::RejectedStale);
        assert_eq!(guard.admit("c", "c", i64::MAX, i64::MAX), Admission::Accepted);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_huge_policy_does_not_overflow_expiry() {
        let guard = ReplayGuard::new(ReplayPolicy::new(u64::MAX));
        assert_eq!(guard.admit("c", "n", i64::MIN, T0), Admission::Accepted);
        assert_eq!(guard.admit("c", "n", T0, T0), Admission::RejectedDuplicate);
    }

    #[test]
    fn test_sweep_bounds_memory() {
        let guard = ReplayGuard::new(ReplayPolicy::new(10));
        for i in 0..100 {
            guard.admit("c", &format!("n{}", i), T0, T0);
        }
        assert_eq!(guard.len(), 100);
        assert_eq!(guard.sweep(T0 + 5), 0);
        assert_eq!(guard.sweep(T0 + 11), 100);
        assert!(guard.is_empty());
    }

    #[test]
    fn test_lazy_eviction_on_admit() {
        let guard = ReplayGuard::new(ReplayPolicy::new(10));
        guard.admit("c", "old", T0, T0);
        guard.admit("c", "new", T0 + 20, T0 + 20);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_concurrent_admission_accepts_exactly_once() {
        let guard = Arc::new(ReplayGuard::new(ReplayPolicy::default()));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || guard.admit("client", "shared", T0, T0))
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| *a == Admission::Accepted)
            .count();
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let guard = Arc::new(ReplayGuard::new(ReplayPolicy::new(1)));
        let clock = ManualClock::new(T0);
        guard.admit("c", "n", T0, T0);
        clock.set(T0 + 5);
        let sweeper = ReplaySweeper::new(guard.clone(), Arc::new(clock), Duration::from_millis(10));
        let token = sweeper.shutdown_token();
        let handle = sweeper.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();
        assert!(guard.is_empty());
    }
}
