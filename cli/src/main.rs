// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # sigrelay
//!
//! Signed remote command execution through a chain of trusted relays.
//!
//! ## Commands
//!
//! - `sigrelay keygen [client|relay|server|all]` - Generate key material
//! - `sigrelay serve` - Run an executor node
//! - `sigrelay relay` - Run a re-signing relay
//! - `sigrelay remote exec|upload|download|ping` - Talk to the configured remote
//! - `sigrelay cache run|lookup|count|cleanup` - Cache-first request execution
//! - `sigrelay store count|cleanup|forget` - Executor command store maintenance
//! - `sigrelay config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use sigrelay::commands::{
    self, CacheCommand, ConfigCommand, KeygenCommand, ListenArgs, RemoteCommand, StoreCommand,
};

/// sigrelay - signed remote execution
#[derive(Parser)]
#[command(name = "sigrelay")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SIGRELAY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SIGRELAY_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate signing keys
    #[command(name = "keygen")]
    Keygen {
        #[command(flatten)]
        command: KeygenCommand,
    },

    /// Run an executor node
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        listen: ListenArgs,
    },

    /// Run a relay node
    #[command(name = "relay")]
    Relay {
        #[command(flatten)]
        listen: ListenArgs,
    },

    /// Operations on the configured remote
    #[command(name = "remote")]
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Semantic command cache
    #[command(name = "cache")]
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Executor command store maintenance
    #[command(name = "store")]
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Keygen { command }) => commands::keygen::execute(command, cli.config).await,
        Some(Commands::Serve { listen }) => commands::serve::run_executor(listen, cli.config).await,
        Some(Commands::Relay { listen }) => commands::serve::run_relay(listen, cli.config).await,
        Some(Commands::Remote { command }) => commands::remote::handle_command(command, cli.config).await,
        Some(Commands::Cache { command }) => commands::cache::handle_command(command, cli.config).await,
        Some(Commands::Store { command }) => commands::store::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
