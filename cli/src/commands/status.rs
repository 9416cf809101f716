// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Swarm inspection commands
//!
//! Commands: status, screen

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use droidswarm_core::domain::agent::AgentStatus;

use crate::embedded::build_swarm;

pub async fn status(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let swarm = build_swarm(config_path)?;
    let agents = swarm.get_agent_status();
    let metrics = swarm.get_metrics().await;

    if json {
        let report = serde_json::json!({ "agents": agents, "metrics": metrics });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Agents:".bold());
    print_agent(&agents.queen);
    for worker in &agents.workers {
        print_agent(worker);
    }
    print_agent(&agents.scout);
    print_agent(&agents.guard);
    println!();

    println!("{}", "Device:".bold());
    println!("  CPU: {:.1}%", metrics.cpu_usage);
    println!("  Memory: {:.1}%", metrics.memory_usage);
    println!("  Temperature: {:.1}°C", metrics.temperature);
    println!("  Pool size: {}", metrics.concurrency);

    Ok(())
}

pub async fn screen(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let swarm = build_swarm(config_path)?;
    let env = swarm.explore_screen().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&env)?);
        return Ok(());
    }

    println!(
        "{} text blocks at confidence >= {:.2}",
        env.elements.len(),
        env.confidence_threshold
    );
    for block in &env.elements {
        println!(
            "  {} ({:.2}) at {},{}",
            block.text.bold(),
            block.confidence,
            block.bounds.x,
            block.bounds.y
        );
    }
    Ok(())
}

fn print_agent(agent: &AgentStatus) {
    let state = if agent.busy { "busy".yellow() } else { "idle".green() };
    println!(
        "  {:<10} {:<7} complexity={:<2} {} tasks={}",
        agent.id, agent.role.to_string(), agent.capability.complexity, state, agent.tasks_completed
    );
}
