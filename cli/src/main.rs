// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # DroidSwarm CLI
//!
//! The `droidswarm` binary hosts the swarm orchestration engine in-process
//! against simulated device capabilities. Useful for exercising
//! decomposition, scheduling and retry behaviour off-device.
//!
//! ## Commands
//!
//! - `droidswarm task run|decompose|check` - Orchestrate a natural-language task
//! - `droidswarm screen` - Run the scout over the simulated screen
//! - `droidswarm status` - Agent roster and device load
//! - `droidswarm config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use droidswarm_cli::commands::{self, ConfigCommand, TaskCommand};

/// DroidSwarm - adaptive swarm orchestration for on-device automation
#[derive(Parser)]
#[command(name = "droidswarm")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DROIDSWARM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DROIDSWARM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Task orchestration
    #[command(name = "task")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Read the current screen through the scout agent
    #[command(name = "screen")]
    Screen {
        /// Print the environment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show agent roster, metrics and device load
    #[command(name = "status")]
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
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
        Some(Commands::Task { command }) => commands::task::handle_command(command, cli.config).await,
        Some(Commands::Screen { json }) => commands::status::screen(cli.config, json).await,
        Some(Commands::Status { json }) => commands::status::status(cli.config, json).await,
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
