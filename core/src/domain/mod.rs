// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: message model, identities, replay vocabulary, execution
//! capabilities and configuration. No I/O happens here.

pub mod command_store;
pub mod error;
pub mod execution;
pub mod identity;
pub mod message;
pub mod node_config;
pub mod replay;
