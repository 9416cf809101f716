// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Task orchestration commands
//!
//! Commands: run, decompose, check

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use droidswarm_core::domain::events::SwarmEvent;
use droidswarm_core::domain::gate::RiskLevel;
use droidswarm_core::infrastructure::event_bus::{EventBusError, EventReceiver};
use droidswarm_core::{ContextMap, ContextValue, SwarmExecutionResult};

use crate::embedded::build_swarm;

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Decompose and execute a natural-language task
    Run {
        /// Task description, e.g. "登录微信" or "search weather"
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        /// Context entries (repeatable), e.g. -x username=alice
        #[arg(short = 'x', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Run every subtask in order on the strongest worker
        #[arg(long)]
        no_swarm: bool,

        /// Print swarm events as the run progresses
        #[arg(short, long)]
        follow: bool,

        /// Print the final result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the subtasks a description decomposes into
    Decompose {
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        #[arg(short = 'x', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Print the subtasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the guard's pre-execution check over every subtask
    Check {
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        #[arg(short = 'x', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },
}

pub async fn handle_command(command: TaskCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        TaskCommand::Run {
            description,
            context,
            no_swarm,
            follow,
            json,
        } => run(config_path, &description, &context, !no_swarm, follow, json).await,
        TaskCommand::Decompose {
            description,
            context,
            json,
        } => decompose(config_path, &description, &context, json),
        TaskCommand::Check { description, context } => check(config_path, &description, &context),
    }
}

async fn run(
    config_path: Option<PathBuf>,
    description: &str,
    pairs: &[String],
    use_swarm: bool,
    follow: bool,
    json: bool,
) -> Result<()> {
    let context = parse_context(pairs)?;
    let swarm = build_swarm(config_path)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let printer = follow.then(|| tokio::spawn(print_events(swarm.event_bus().subscribe())));

    if !json {
        println!("Running task: {}", description.bold());
    }
    let result = swarm
        .execute_task_with_cancellation(description, &context, use_swarm, cancel)
        .await;

    if let Some(handle) = printer {
        handle.await.context("Event printer stopped unexpectedly")?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.success {
        std::process::exit(2);
    }
    Ok(())
}

fn decompose(config_path: Option<PathBuf>, description: &str, pairs: &[String], json: bool) -> Result<()> {
    let context = parse_context(pairs)?;
    let swarm = build_swarm(config_path)?;
    let tasks = swarm.decompose(description, &context);

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("{}", "No subtasks produced".yellow());
        return Ok(());
    }

    println!("{} subtasks:", tasks.len());
    for task in &tasks {
        let deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
        println!(
            "  {} [{}] priority={} complexity={}{}",
            task.id.bold(),
            task.task_type,
            task.priority,
            task.complexity,
            if deps.is_empty() {
                String::new()
            } else {
                format!(" after {}", deps.join(", "))
            }
        );
        println!("    {}", task.description.dimmed());
    }
    Ok(())
}

fn check(config_path: Option<PathBuf>, description: &str, pairs: &[String]) -> Result<()> {
    let context = parse_context(pairs)?;
    let swarm = build_swarm(config_path)?;

    for task in swarm.decompose(description, &context) {
        let gate = swarm.check_task(&task, &context);
        let risk = match gate.risk {
            RiskLevel::Low => "low".green(),
            RiskLevel::Medium => "medium".yellow(),
            RiskLevel::High => "high".red(),
        };
        let verdict = if gate.passed { "✓".green() } else { "✗".red() };
        println!("  {} {} (risk: {})", verdict, task.id.bold(), risk);
        for issue in &gate.issues {
            println!("      {}", issue);
        }
    }
    Ok(())
}

async fn print_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let done = matches!(event, SwarmEvent::RunCompleted { .. });
                print_event(&event);
                if done {
                    break;
                }
            }
            Err(EventBusError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn print_event(event: &SwarmEvent) {
    match event {
        SwarmEvent::RunStarted { run_id, .. } => println!("{} run {}", "▶".cyan(), run_id),
        SwarmEvent::Decomposed {
            subtask_count,
            stage_count,
            active_workers,
            ..
        } => println!(
            "  {} subtasks in {} stages on {} workers",
            subtask_count, stage_count, active_workers
        ),
        SwarmEvent::StageStarted {
            stage_index, task_ids, ..
        } => println!("  stage {}: {}", stage_index, task_ids.join(", ")),
        SwarmEvent::SubTaskCompleted {
            task_id,
            success,
            executed_by,
            attempts,
            error,
            ..
        } => {
            if *success {
                println!("    {} {} by {} ({} attempts)", "✓".green(), task_id, executed_by, attempts);
            } else {
                println!(
                    "    {} {} by {}: {}",
                    "✗".red(),
                    task_id,
                    executed_by,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        SwarmEvent::StageCompleted { .. } => {}
        SwarmEvent::CircuitBreakerTripped {
            task_id, skipped_stages, ..
        } => println!(
            "  {} critical subtask {} failed, skipping {} stages",
            "!".red(),
            task_id,
            skipped_stages
        ),
        SwarmEvent::RunCompleted {
            completed_tasks,
            total_tasks,
            ..
        } => println!("{} {}/{} subtasks completed", "■".cyan(), completed_tasks, total_tasks),
    }
}

fn print_result(result: &SwarmExecutionResult) {
    if result.success {
        println!(
            "{}",
            format!(
                "✓ Completed {}/{} subtasks in {} ms",
                result.completed_tasks, result.total_tasks, result.execution_time_ms
            )
            .green()
        );
    } else {
        println!(
            "{}",
            format!(
                "✗ Failed: {} ({}/{} subtasks completed)",
                result.error.as_deref().unwrap_or("unknown error"),
                result.completed_tasks,
                result.total_tasks
            )
            .red()
        );
        for (task_id, error) in result.failures() {
            println!("  {}: {}", task_id.bold(), error);
        }
    }

    if let Some(metrics) = &result.metrics {
        println!(
            "  success rate {:.0}%, avg {:.0} ms, cpu {:.0}%, mem {:.0}%, {:.1}°C",
            metrics.success_rate * 100.0,
            metrics.avg_execution_time_ms,
            metrics.cpu_usage,
            metrics.memory_usage,
            metrics.temperature
        );
    }
}

/// Parse repeated `key=value` arguments into a context map.
pub fn parse_context(pairs: &[String]) -> Result<ContextMap> {
    let mut context = ContextMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid context entry '{}': expected KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid context entry '{}': empty key", pair);
        }
        context.insert(key.to_string(), ContextValue::parse_literal(value));
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_context_values() {
        let pairs = vec![
            "username=alice".to_string(),
            "wait_ms=250".to_string(),
            "remember=true".to_string(),
            "note=a=b".to_string(),
        ];
        let ctx = parse_context(&pairs).unwrap();
        assert_eq!(ctx["username"], ContextValue::String("alice".into()));
        assert_eq!(ctx["wait_ms"], ContextValue::Int(250));
        assert_eq!(ctx["remember"], ContextValue::Bool(true));
        assert_eq!(ctx["note"], ContextValue::String("a=b".into()));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(parse_context(&["username".to_string()]).is_err());
        assert!(parse_context(&["=alice".to_string()]).is_err());
    }
}
