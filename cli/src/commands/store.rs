// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Executor command store maintenance
//!
//! Commands: count, cleanup, forget
//!
//! Opens `spec.executor.command_store_path` directly. The executor holds the
//! store lock while it runs, so stop it first.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use sigrelay_core::domain::command_store::RemoteCommandStore;
use sigrelay_core::domain::node_config::NodeConfig;
use sigrelay_core::infrastructure::SledCommandStore;

#[derive(Subcommand)]
pub enum StoreCommand {
    /// Number of stored commands
    Count,

    /// Remove commands not used within the given number of days
    Cleanup {
        #[arg(long, default_value = "30")]
        days: i64,
    },

    /// Remove the command stored under KEY
    Forget {
        #[arg(value_name = "KEY")]
        key: Uuid,
    },
}

pub async fn handle_command(command: StoreCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let path = config
        .spec
        .executor
        .command_store_path
        .as_deref()
        .context("spec.executor.command_store_path is not set; an in-memory store has nothing to maintain")?;
    let store = SledCommandStore::open(path)
        .with_context(|| format!("Failed to open command store at {} (is the executor still running?)", path))?;
    let message = run(command, &store).await?;
    println!("{}", message);
    Ok(())
}

/// Apply `command` to `store` and describe the result.
pub async fn run(command: StoreCommand, store: &dyn RemoteCommandStore) -> Result<String> {
    match command {
        StoreCommand::Count => Ok(store.count().await?.to_string()),
        StoreCommand::Cleanup { days } => {
            let removed = store.cleanup_older_than_days(days).await?;
            Ok(format!(
                "{} Removed {} commands unused for {} days",
                "✓".green(),
                removed,
                days
            ))
        }
        StoreCommand::Forget { key } => {
            if store.delete(key).await? {
                Ok(format!("{} Removed {}", "✓".green(), key))
            } else {
                anyhow::bail!("No command stored under {}", key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigrelay_core::infrastructure::InMemoryCommandStore;

    #[tokio::test]
    async fn test_forget_and_count() {
        let store = InMemoryCommandStore::new();
        let key = Uuid::new_v4();
        store.put(key, "uptime").await.unwrap();

        assert_eq!(run(StoreCommand::Count, &store).await.unwrap(), "1");
        assert!(run(StoreCommand::Forget { key }, &store).await.is_ok());
        assert_eq!(run(StoreCommand::Count, &store).await.unwrap(), "0");
        assert!(run(StoreCommand::Forget { key }, &store).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_rejects_out_of_range_days() {
        let store = InMemoryCommandStore::new();
        store.put(Uuid::new_v4(), "uptime").await.unwrap();

        assert!(run(StoreCommand::Cleanup { days: i64::MAX }, &store).await.is_err());
        assert!(run(StoreCommand::Cleanup { days: -1 }, &store).await.is_err());
        assert!(run(StoreCommand::Cleanup { days: 1_000_000_000 }, &store).await.is_ok());
        assert!(run(StoreCommand::Cleanup { days: 30 }, &store).await.is_ok());
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
