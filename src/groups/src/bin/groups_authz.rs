//! Groups Authorization Resolver - command line
//!
//! Loads a configuration and a seed into an in-memory resolver and answers
//! a single query:
//!
//! ```text
//! groups-authz --seed fruits.toml check user:1 dance
//! groups-authz --seed fruits.toml effective group:Sour
//! groups-authz --seed fruits.toml tree
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use groups_authz::{Authz, AuthzConfig, CapabilityRef, Seed};
use std::path::PathBuf;
use tracing::info;

/// Groups authorization resolver CLI
#[derive(Parser)]
#[command(name = "groups-authz")]
#[command(about = "Resolve group-inherited capabilities from a seed file")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file (defaults apply when omitted)
    #[arg(short, long, env = "GROUPS_AUTHZ_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a JSON or TOML seed file
    #[arg(short, long, env = "GROUPS_AUTHZ_SEED")]
    seed: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print "allow" or "deny" for a principal and capability
    Check {
        /// user:<id>, group:<id> or group:<name>
        principal: String,

        /// Capability id or label
        capability: String,
    },

    /// Print the effective capability labels of a principal
    Effective {
        /// user:<id>, group:<id> or group:<name>
        principal: String,
    },

    /// Print the group forest
    Tree,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the answer
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => AuthzConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => AuthzConfig::default(),
    };

    let seed = Seed::from_file(&cli.seed)
        .with_context(|| format!("failed to load seed from {}", cli.seed.display()))?;

    let authz = Authz::in_memory(config);
    seed.apply(&authz).await.context("failed to apply seed")?;
    info!("Loaded seed from {}", cli.seed.display());

    match cli.command {
        Command::Check {
            principal,
            capability,
        } => {
            let principal = authz
                .lookup_principal(&principal)
                .await
                .with_context(|| format!("unknown principal '{}'", principal))?;
            // An empty reference is undefined and denied, like `can(P, None)`
            let capability = if capability.trim().is_empty() {
                CapabilityRef::Undefined
            } else {
                CapabilityRef::parse(&capability)?
            };
            let allowed = authz.can(&principal, capability).await?;
            println!("{}", if allowed { "allow" } else { "deny" });
        }
        Command::Effective { principal } => {
            let principal = authz
                .lookup_principal(&principal)
                .await
                .with_context(|| format!("unknown principal '{}'", principal))?;
            for label in authz.resolver().capabilities(&principal).await?.iter() {
                println!("{}", label);
            }
        }
        Command::Tree => {
            for (depth, group) in authz.groups().tree().await? {
                println!("{}{} ({})", "  ".repeat(depth), group.name, group.id);
            }
        }
    }

    Ok(())
}
