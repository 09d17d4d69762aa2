// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Semantic command cache
//!
//! Maps a natural-language request to a previously produced command by
//! embedding similarity, with a three-tier confidence policy.
//!
//! # Architecture
//!
//! - **Layer:** Client-side cache
//! - **Purpose:** Skip translation for requests that were effectively seen before

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
