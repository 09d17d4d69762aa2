// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Direct remote operations
//!
//! Commands: exec, upload, download, ping

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use sigrelay_core::domain::execution::ExecutionResult;
use sigrelay_core::domain::message::{CommandRequest, UploadRequest};
use sigrelay_core::domain::node_config::NodeConfig;
use sigrelay_core::infrastructure::wire::MAX_TRANSFER_BYTES;

use crate::node;

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Run a shell command on the remote executor
    Exec {
        /// Command line, passed to `sh -c`
        #[arg(value_name = "COMMAND", required = true, num_args = 1..)]
        command: Vec<String>,

        /// Working directory on the remote host
        #[arg(long)]
        cwd: Option<String>,

        /// Timeout in seconds (0 = executor default)
        #[arg(short, long, default_value = "0")]
        timeout: u64,
    },

    /// Upload a local file
    Upload {
        #[arg(value_name = "LOCAL")]
        local: PathBuf,

        #[arg(value_name = "REMOTE")]
        remote: String,

        /// Octal file mode applied on the remote host
        #[arg(long)]
        mode: Option<String>,
    },

    /// Download a remote file
    Download {
        #[arg(value_name = "REMOTE")]
        remote: String,

        /// Local destination (default: remote file name in the current directory)
        #[arg(value_name = "LOCAL")]
        local: Option<PathBuf>,
    },

    /// Check that the remote end answers and accepts our signatures
    Ping,
}

pub async fn handle_command(command: RemoteCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let mut session = node::connect_remote(&config).await?;

    match command {
        RemoteCommand::Exec { command, cwd, timeout } => {
            let request = CommandRequest {
                command: command.join(" "),
                cwd,
                timeout_secs: timeout,
            };
            let result = session.execute_command(request).await.context("Remote execution failed")?;
            print_result(&result);
            if !result.success {
                std::process::exit(result.exit_code.clamp(1, 255));
            }
        }
        RemoteCommand::Upload { local, remote, mode } => {
            let size = tokio::fs::metadata(&local)
                .await
                .with_context(|| format!("Failed to read {}", local.display()))?
                .len();
            if size > MAX_TRANSFER_BYTES {
                anyhow::bail!(
                    "{} is {} bytes; uploads are limited to {} bytes",
                    local.display(),
                    size,
                    MAX_TRANSFER_BYTES
                );
            }
            let data = tokio::fs::read(&local)
                .await
                .with_context(|| format!("Failed to read {}", local.display()))?;
            let result = session
                .upload(UploadRequest::new(remote.clone(), &data, mode))
                .await
                .context("Upload failed")?;
            if result.success {
                println!(
                    "{} Uploaded {} bytes to {}",
                    "✓".green(),
                    result.bytes_written,
                    remote
                );
            } else {
                anyhow::bail!("Upload rejected: {}", result.message);
            }
        }
        RemoteCommand::Download { remote, local } => {
            let result = session.download(remote.clone()).await.context("Download failed")?;
            let data = match result.decode_data()? {
                Some(data) if result.found => data,
                _ => anyhow::bail!("{}: {}", remote, result.message),
            };
            let local = local.unwrap_or_else(|| {
                PathBuf::from(
                    std::path::Path::new(&remote)
                        .file_name()
                        .map(|name| name.to_os_string())
                        .unwrap_or_else(|| "download".into()),
                )
            });
            tokio::fs::write(&local, &data)
                .await
                .with_context(|| format!("Failed to write {}", local.display()))?;
            println!(
                "{} Downloaded {} bytes to {}",
                "✓".green(),
                data.len(),
                local.display()
            );
        }
        RemoteCommand::Ping => {
            let pong = session.ping().await.context("Ping failed")?;
            println!(
                "{} {} answered (remote time {})",
                "✓".green(),
                pong.node_id.bold(),
                pong.time
            );
        }
    }
    Ok(())
}

pub(crate) fn print_result(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr.red());
    }
    if result.timed_out {
        eprintln!("{}", "Command timed out".yellow());
    } else if !result.success {
        eprintln!("{}", format!("Exit code: {}", result.exit_code).yellow());
    }
}
