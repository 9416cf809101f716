// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Stages & Results
//!
//! | Type | Produced by | Notes |
//! |------|-------------|-------|
//! | `ExecutionStage` | scheduler | dependency-satisfied by all prior stages |
//! | `SwarmTaskResult` | queen | exactly one per dispatched subtask |
//! | `SwarmExecutionResult` | queen | terminal artifact of one run |

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::capability::ActionResult;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::subtask::SubTask;

/// Unique identifier for one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionStage {
    pub tasks: Vec<SubTask>,
}

impl ExecutionStage {
    pub fn new(tasks: Vec<SubTask>) -> Self {
        Self { tasks }
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }
}

pub const UNASSIGNED_WORKER: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmTaskResult {
    pub task_id: String,
    pub success: bool,
    pub result: Option<ActionResult>,
    /// Worker id, or `"none"` when no worker was assigned.
    pub executed_by: String,
    pub execution_time_ms: u64,
    /// Number of attempts made; 0 when the task never reached a worker.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SwarmTaskResult {
    pub fn unassigned(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            result: None,
            executed_by: UNASSIGNED_WORKER.to_string(),
            execution_time_ms: 0,
            attempts: 0,
            error: Some(error.into()),
        }
    }

    pub fn message(&self) -> &str {
        self.result.as_ref().map(|r| r.message.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmExecutionResult {
    pub run_id: RunId,
    pub success: bool,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub execution_time_ms: u64,
    /// Stage order preserved; order inside a stage follows submission order.
    pub results: Vec<SwarmTaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SwarmExecutionResult {
    pub fn failed(run_id: RunId, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            run_id,
            success: false,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            execution_time_ms,
            results: Vec::new(),
            metrics: None,
            error: Some(error.into()),
        }
    }

    /// `(task_id, error)` pairs for every failed subtask.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| (r.task_id.as_str(), r.error.as_deref().unwrap_or("unknown error")))
            .collect()
    }
}
