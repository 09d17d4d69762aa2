// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the sigrelay CLI

pub mod cache;
pub mod config;
pub mod keygen;
pub mod remote;
pub mod serve;
pub mod store;

pub use self::cache::CacheCommand;
pub use self::config::ConfigCommand;
pub use self::keygen::KeygenCommand;
pub use self::remote::RemoteCommand;
pub use self::serve::ListenArgs;
pub use self::store::StoreCommand;
