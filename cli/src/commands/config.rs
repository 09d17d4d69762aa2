// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use sigrelay_core::domain::identity::MessageSigner;
use sigrelay_core::domain::node_config::{NodeConfig, NodeRole};

use crate::node;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file and the key files it points at
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Skip loading key material
        #[arg(long)]
        skip_keys: bool,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./sigrelay-config.yaml)
        #[arg(short, long, default_value = "./sigrelay-config.yaml")]
        output: PathBuf,

        /// Annotated relay configuration instead of the minimal client one
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file, skip_keys } => validate(file.or(config_override), skip_keys).await,
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(output, examples, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SIGRELAY_CONFIG_PATH: {}",
            std::env::var("SIGRELAY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./sigrelay-config.yaml");
        println!("  4. ~/.sigrelay/config.yaml");
        println!("  5. /etc/sigrelay/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    let spec = &config.spec;

    println!("{}", "Node Identity:".bold());
    println!("  ID: {}", spec.node.id);
    println!("  Role: {}", spec.node.role);
    println!();

    println!("{}", "Signing:".bold());
    println!("  Scheme: {}", spec.signing.scheme.as_str());
    println!("  Key directory: {}", spec.signing.key_dir().display());
    if spec.signing.trusted_peers.is_empty() {
        println!("  Trusted peers: {}", "(none)".dimmed());
    } else {
        println!("  Trusted peers:");
        for peer in &spec.signing.trusted_peers {
            println!("    - {} → {}", peer.id, spec.signing.peer_key_file(peer).display());
        }
    }
    println!();

    println!("{}", "Replay Protection:".bold());
    println!("  Window: {}s", spec.replay.window_secs);
    println!(
        "  Max clock skew: {}s",
        spec.replay.max_clock_skew_secs.unwrap_or(spec.replay.window_secs)
    );
    println!();

    println!("{}", "Network:".bold());
    println!("  Listen: {}", spec.network.listen_address());
    println!("  Remote: {} ({})", spec.remote.address, spec.remote.id);
    if let Some(relay) = &spec.relay {
        println!("  Upstream: {} ({})", relay.upstream_address, relay.upstream_id);
    }
    println!();

    println!("{}", "Semantic Cache:".bold());
    if spec.cache.enabled {
        println!("  Path: {}", spec.cache.path().display());
        println!(
            "  Thresholds: exact ≥ {}, near ≥ {}",
            spec.cache.exact_threshold, spec.cache.near_threshold
        );
        println!(
            "  Embeddings: {} ({})",
            spec.cache.embedding.model, spec.cache.embedding.endpoint
        );
    } else {
        println!("  {}", "disabled".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>, skip_keys: bool) -> Result<()> {
    let config = NodeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    println!("{} Manifest is valid", "✓".green());

    if skip_keys {
        return Ok(());
    }

    // Relays and clients also need the key of the hop they talk to.
    let mut extra = vec![];
    if let Some(relay) = &config.spec.relay {
        extra.push(relay.upstream_id.as_str());
    }
    if config.spec.node.role == NodeRole::Client {
        extra.push(config.spec.remote.id.as_str());
    }
    let material = node::load_keys(&config, &extra)?;
    println!(
        "{} Keys loaded for '{}' ({}, {} peers)",
        "✓".green(),
        material.signer.sender_id(),
        config.spec.signing.scheme.as_str(),
        material.known_peers.peers().count()
    );
    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    tokio::fs::write(&output, sample)
        .await
        .with_context(|| format!("Failed to write config to {}", output.display()))?;

    println!("{} Configuration generated: {}", "✓".green(), output.display());
    println!("{}", "Next: sigrelay keygen, then sigrelay config validate".dimmed());
    Ok(())
}
