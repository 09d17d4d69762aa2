// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Semantic cache commands
//!
//! Commands: run, lookup, count, cleanup

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use sigrelay_core::domain::node_config::NodeConfig;
use sigrelay_cortex::{FixedSuitability, LookupOutcome, SemanticCache};

use crate::commands::remote::print_result;
use crate::node;
use crate::pipeline::{CachePipeline, CommandSource, ExecutionOptions, StaticTranslator};

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Run a natural-language request, reusing a cached command when possible
    Run {
        /// The request, e.g. "show disk usage"
        #[arg(value_name = "REQUEST", required = true, num_args = 1..)]
        request: Vec<String>,

        /// Command to use when the cache has no match
        #[arg(long)]
        command: Option<String>,

        /// Explanation stored with --command
        #[arg(long, requires = "command")]
        explanation: Option<String>,

        /// Accept near matches without confirmation
        #[arg(long)]
        accept_near: bool,

        #[arg(long)]
        cwd: Option<String>,

        /// Timeout in seconds (0 = executor default)
        #[arg(short, long, default_value = "0")]
        timeout: u64,
    },

    /// Show what the local cache would return for a request
    Lookup {
        #[arg(value_name = "REQUEST", required = true, num_args = 1..)]
        request: Vec<String>,
    },

    /// Number of cached entries
    Count,

    /// Remove entries not used within the given number of days
    Cleanup {
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

pub async fn handle_command(command: CacheCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;
    if !config.spec.cache.enabled {
        anyhow::bail!("Semantic cache is disabled (spec.cache.enabled = false)");
    }
    let cache = node::semantic_cache(&config)?;

    match command {
        CacheCommand::Run {
            request,
            command,
            explanation,
            accept_near,
            cwd,
            timeout,
        } => {
            let request = request.join(" ");
            let translator = StaticTranslator::new(command, explanation);
            let validator = FixedSuitability(accept_near);
            let pipeline = CachePipeline::new(&cache, &translator, &validator);
            let mut session = node::connect_remote(&config).await?;
            let options = ExecutionOptions {
                cwd,
                timeout_secs: timeout,
            };
            let outcome = pipeline.run(&mut session, &request, &[], &options).await?;
            let source = match outcome.source {
                CommandSource::CacheHit => "cache hit".green(),
                CommandSource::ValidatedNearMatch => "near match".yellow(),
                CommandSource::Translated => "new".cyan(),
            };
            eprintln!("{} [{}] {}", "→".dimmed(), source, outcome.command.bold());
            print_result(&outcome.result);
            if !outcome.result.success {
                std::process::exit(outcome.result.exit_code.clamp(1, 255));
            }
        }
        CacheCommand::Lookup { request } => match cache.lookup(&request.join(" ")).await? {
            LookupOutcome::Hit {
                id,
                command,
                explanation,
                similarity,
            } => {
                println!("{} ({:.4}) {}", "Hit".green().bold(), similarity, id);
                println!("  command:     {}", command);
                println!("  explanation: {}", explanation);
            }
            LookupOutcome::NearMatch {
                id,
                command,
                explanation,
                similarity,
            } => {
                println!("{} ({:.4}) {}", "Near match".yellow().bold(), similarity, id);
                println!("  command:     {}", command);
                println!("  explanation: {}", explanation);
            }
            LookupOutcome::Miss => println!("{}", "Miss".dimmed()),
        },
        CacheCommand::Count => {
            println!("{}", cache.count().await?);
        }
        CacheCommand::Cleanup { days } => {
            let removed = cache.cleanup_older_than(days).await?;
            println!("{} Removed {} entries unused for {} days", "✓".green(), removed, days);
        }
    }
    Ok(())
}
