// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit;
pub mod command_store;
pub mod file_transfer;
pub mod replay_guard;
pub mod shell_executor;
pub mod signing;
pub mod wire;

pub use audit::SecurityAuditLog;
pub use command_store::{InMemoryCommandStore, SledCommandStore};
pub use file_transfer::LocalFileTransfer;
pub use replay_guard::{ReplayGuard, ReplaySweeper};
pub use shell_executor::ShellExecutor;
pub use wire::MessageCodec;
