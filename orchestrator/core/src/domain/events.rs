// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Events
//!
//! Emitted by the queen while a run progresses and fanned out through the
//! in-process event bus. Purely observational: nothing in the engine reacts
//! to its own events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::execution::RunId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwarmEvent {
    RunStarted {
        run_id: RunId,
        description: String,
        started_at: DateTime<Utc>,
    },
    Decomposed {
        run_id: RunId,
        subtask_count: usize,
        stage_count: usize,
        active_workers: usize,
    },
    StageStarted {
        run_id: RunId,
        stage_index: usize,
        task_ids: Vec<String>,
    },
    SubTaskCompleted {
        run_id: RunId,
        task_id: String,
        success: bool,
        executed_by: String,
        attempts: u32,
        error: Option<String>,
    },
    StageCompleted {
        run_id: RunId,
        stage_index: usize,
        succeeded: usize,
        failed: usize,
    },
    CircuitBreakerTripped {
        run_id: RunId,
        stage_index: usize,
        task_id: String,
        skipped_stages: usize,
    },
    RunCompleted {
        run_id: RunId,
        success: bool,
        completed_tasks: usize,
        total_tasks: usize,
        completed_at: DateTime<Utc>,
    },
}

impl SwarmEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            SwarmEvent::RunStarted { run_id, .. }
            | SwarmEvent::Decomposed { run_id, .. }
            | SwarmEvent::StageStarted { run_id, .. }
            | SwarmEvent::SubTaskCompleted { run_id, .. }
            | SwarmEvent::StageCompleted { run_id, .. }
            | SwarmEvent::CircuitBreakerTripped { run_id, .. }
            | SwarmEvent::RunCompleted { run_id, .. } => *run_id,
        }
    }
}
