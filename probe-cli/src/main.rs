//! # clusterprobe
//!
//! Runs networking and metrics suites against a live cluster.
//!
//! ## Commands
//!
//! - `vip`: every VIP routing scenario
//! - `l4lb`: load balancer distribution over one VIP
//! - `overlay`: overlay network health on every node
//! - `metrics`: metrics API on every node, container metrics
//! - `ip-per-container`: overlay containers reach each other by IP
//! - `minuteman`: no load balancer rule when it is disabled
//! - `all`: every suite above
//! - `scenarios`: list VIP scenarios without touching the cluster
//!
//! ## Example
//!
//! ```bash
//! # See what a VIP run would exercise
//! clusterprobe scenarios
//!
//! # Run the VIP matrix with debug logging
//! clusterprobe --config cluster.toml --verbose vip
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use probe_suites::Suite;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use commands::{scenarios, suite};
use config::Config;

/// Runs networking and metrics suites against a live cluster.
#[derive(Parser, Debug)]
#[command(name = "clusterprobe")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: clusterprobe.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route through every VIP scenario
    Vip {
        /// Scenarios in flight at once (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Check load balancer distribution over one VIP
    L4lb,

    /// Check overlay network health on every node
    Overlay,

    /// Check the metrics API on every node
    Metrics,

    /// Check overlay containers reach each other by IP
    IpPerContainer,

    /// Check the load balancer rule is absent when disabled
    Minuteman,

    /// Run every suite
    All,

    /// List VIP scenarios without touching the cluster
    Scenarios {
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    let suites: Vec<Suite> = match cli.command {
        Commands::Scenarios { json } => {
            scenarios::run(&config, json).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Vip { concurrency } => {
            if let Some(n) = concurrency {
                config.runner.concurrency = n;
            }
            vec![Suite::Vip]
        }
        Commands::L4lb => vec![Suite::L4lb],
        Commands::Overlay => vec![Suite::Overlay],
        Commands::Metrics => vec![Suite::Metrics],
        Commands::IpPerContainer => vec![Suite::IpPerContainer],
        Commands::Minuteman => vec![Suite::Minuteman],
        Commands::All => Suite::ALL.to_vec(),
    };

    if config.runner.concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }

    if suite::run(&config, &suites).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
