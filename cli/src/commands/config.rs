// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use droidswarm_core::domain::swarm_config::CONFIG_PATH_ENV;
use droidswarm_core::SwarmConfigManifest;

use crate::embedded::load_config;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path (default: ./droidswarm-config.yaml)
        #[arg(short, long, default_value = "./droidswarm-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SwarmConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  --config flag: {}", path.display()),
            None => println!("  --config flag: {}", "(not set)".dimmed()),
        }
        for (i, path) in SwarmConfigManifest::search_paths().iter().enumerate() {
            let marker = if path.exists() { "found".green() } else { "missing".dimmed() };
            println!("  {}. {} [{}]", i + 1, path.display(), marker);
        }
        println!("  ({} is checked first when set)", CONFIG_PATH_ENV);
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    println!("{}", "Workers:".bold());
    for worker in &spec.workers {
        let ratings: Vec<String> = worker
            .capability
            .ratings()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("  {} ({})", worker.id.bold(), ratings.join(", "));
    }
    println!();

    println!("{}", "Scheduler:".bold());
    println!("  Cycle policy: {:?}", spec.scheduler.cycle_policy);
    println!("  Max active workers: {}", spec.scheduler.max_active_workers);
    println!();

    println!("{}", "Retry backoff:".bold());
    println!("  Base delay: {} ms", spec.retry.base_delay_ms);
    println!("  Multiplier: {}", spec.retry.multiplier);
    println!("  Max delay: {} ms", spec.retry.max_delay_ms);
    println!();

    println!("{}", "Execution:".bold());
    println!("  Enforce gate: {}", spec.execution.enforce_gate);
    println!("  Adaptive retry: {}", spec.execution.adaptive_retry);
    println!();

    println!("{}", "Device metrics:".bold());
    println!("  Thermal zone: {}", spec.device_metrics.thermal_zone.display());
    println!(
        "  Fallback load: cpu {}%, memory {}%, {}°C",
        spec.device_metrics.fallback_cpu_percent,
        spec.device_metrics.fallback_memory_percent,
        spec.device_metrics.fallback_temperature_c
    );

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");
    load_config(config_path)?;
    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    SwarmConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("droidswarm-config.yaml");
        generate(path.clone()).unwrap();
        assert!(validate(Some(path)).is_ok());
    }

    #[test]
    fn validate_rejects_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "apiVersion: droidswarm/v0\nkind: SwarmConfig\nmetadata:\n  name: x\nspec: {}\n").unwrap();
        assert!(validate(Some(path)).is_err());
    }
}
