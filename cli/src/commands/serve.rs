// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Long-running node commands: `serve` (executor) and `relay`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sigrelay_core::application::{serve, SessionShell};
use sigrelay_core::domain::node_config::NodeConfig;

use crate::node;

#[derive(Args)]
pub struct ListenArgs {
    /// Bind address (overrides spec.network.bind_address)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides spec.network.port)
    #[arg(short, long)]
    port: Option<u16>,
}

impl ListenArgs {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(bind) = &self.bind {
            config.spec.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.spec.network.port = port;
        }
    }
}

/// `sigrelay serve`: accept signed requests and execute them locally.
pub async fn run_executor(args: ListenArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load(config_override, &args)?;
    let material = node::load_keys(&config, &[])?;
    let context = node::signing_context(&config, material);
    let shell = node::executor_shell(&config, context)?;
    run_shell(&config, shell, "executor").await
}

/// `sigrelay relay`: verify downstream requests, re-sign and forward them upstream.
pub async fn run_relay(args: ListenArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load(config_override, &args)?;
    let material = node::load_keys(&config, &[])?;
    let context = node::signing_context(&config, material);
    let shell = node::relay_shell(&config, context)?;
    run_shell(&config, shell, "relay").await
}

fn load(config_override: Option<PathBuf>, args: &ListenArgs) -> Result<NodeConfig> {
    let mut config = NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Configuration validation failed")?;
    if config.spec.signing.trusted_peers.is_empty() {
        warn!("No trusted peers configured; every request will be rejected");
    }
    Ok(config)
}

async fn run_shell(config: &NodeConfig, shell: SessionShell, role: &str) -> Result<()> {
    let address = config.spec.network.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    let sweeper = node::start_sweeper(config, shell.context());
    let shutdown = CancellationToken::new();

    println!(
        "{} {} '{}' listening on {}",
        "✓".green(),
        role,
        config.spec.node.id.bold(),
        address
    );

    let server = tokio::spawn(serve(listener, Arc::new(shell), shutdown.clone()));
    shutdown_signal().await;

    info!("Shutting down {}", role);
    shutdown.cancel();
    sweeper.cancel();
    server.await.context("Listener task failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
