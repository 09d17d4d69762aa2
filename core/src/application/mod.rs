// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod client;
pub mod executor_service;
pub mod gate;
pub mod relay_service;
pub mod session;
pub mod trust_chain;

pub use client::RemoteSession;
pub use executor_service::ExecutorService;
pub use gate::{MessageGate, SigningContext};
pub use relay_service::{RelayService, UpstreamPool};
pub use session::{serve, MessageHandler, SessionShell};
pub use trust_chain::{TrustChain, TrustHop};
