// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Key generation
//!
//! Ed25519 keypairs per role, or one HMAC shared secret.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use sigrelay_core::domain::identity::SigningScheme;
use sigrelay_core::domain::node_config::NodeConfig;
use sigrelay_core::infrastructure::signing::{generate_keypair, generate_shared_secret};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyRole {
    Client,
    Relay,
    Server,
    All,
}

impl KeyRole {
    fn identities(self) -> &'static [&'static str] {
        match self {
            Self::Client => &["client"],
            Self::Relay => &["relay"],
            Self::Server => &["server"],
            Self::All => &["client", "relay", "server"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    Ed25519,
    #[value(name = "hmac-sha256")]
    HmacSha256,
}

impl From<SchemeArg> for SigningScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Ed25519 => SigningScheme::Ed25519,
            SchemeArg::HmacSha256 => SigningScheme::HmacSha256,
        }
    }
}

#[derive(Args)]
pub struct KeygenCommand {
    /// Role to generate keys for
    #[arg(value_enum, default_value = "all")]
    role: KeyRole,

    /// Custom identity instead of the role name (ed25519 only)
    #[arg(long, conflicts_with = "role")]
    id: Option<String>,

    /// Signing scheme (default: from configuration)
    #[arg(long, value_enum)]
    scheme: Option<SchemeArg>,

    /// Key directory (default: spec.signing.key_dir or ~/.sigrelay/keys)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Overwrite existing key files
    #[arg(long)]
    force: bool,
}

pub async fn execute(command: KeygenCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let signing = &config.spec.signing;
    let dir = command.dir.clone().unwrap_or_else(|| signing.key_dir());
    let scheme = command.scheme.map(SigningScheme::from).unwrap_or(signing.scheme);

    match scheme {
        SigningScheme::Ed25519 => {
            let ids: Vec<&str> = match &command.id {
                Some(id) => vec![id.as_str()],
                None => command.role.identities().to_vec(),
            };
            for id in ids {
                let paths = generate_keypair(&dir, id, command.force)
                    .with_context(|| format!("Failed to generate keypair for '{}'", id))?;
                println!("{} {}", "✓".green(), format!("Generated keypair for {}", id).bold());
                println!("  private: {}", paths.private_key.display());
                println!("  public:  {}", paths.public_key.display());
            }
            println!();
            println!(
                "{}",
                "Copy each peer's *_public.key to the nodes that must trust it.".dimmed()
            );
        }
        SigningScheme::HmacSha256 => {
            let path = match (&command.dir, &signing.shared_secret_path) {
                (None, Some(path)) => PathBuf::from(path),
                _ => dir.join("shared_secret.key"),
            };
            let path = generate_shared_secret(&path, command.force)
                .context("Failed to generate shared secret")?;
            println!("{} Generated HMAC shared secret: {}", "✓".green(), path.display());
            println!(
                "{}",
                "Every node in the chain needs the same secret file.".dimmed()
            );
        }
    }
    Ok(())
}
