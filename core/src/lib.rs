// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # sigrelay-core
//!
//! Signed message protocol for remote command execution.
//!
//! # Architecture
//!
//! - **domain**: message model, identities, replay policy, error taxonomy,
//!   node configuration.
//! - **infrastructure**: signature schemes, replay guard, wire codec, shell
//!   executor, file transfer, command store.
//! - **application**: inbound gate, connection sessions, client sessions,
//!   trust-chain relay, executor and relay handlers.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{KeyError, ProtocolError};
