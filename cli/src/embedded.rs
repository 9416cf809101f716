// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process swarm host
//!
//! Loads and validates configuration, then wires a [`SwarmManager`] over
//! simulated executor and vision capabilities. Device load comes from
//! procfs when available, else from the configured fallbacks.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use droidswarm_core::infrastructure::simulated::{SimulatedExecutor, SimulatedVision};
use droidswarm_core::{SwarmConfigManifest, SwarmManager};

pub fn load_config(config_path: Option<PathBuf>) -> Result<SwarmConfigManifest> {
    let config = SwarmConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

pub fn build_swarm(config_path: Option<PathBuf>) -> Result<SwarmManager> {
    let config = load_config(config_path)?;
    debug!(name = %config.metadata.name, workers = config.spec.workers.len(), "Building embedded swarm");

    Ok(SwarmManager::with_proc_metrics(
        &config.spec,
        Arc::new(SimulatedExecutor::new()),
        Arc::new(SimulatedVision::default()),
    ))
}
