// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use crate::domain::capability::CapabilityError;
use crate::domain::context::ContextError;

/// Failure taxonomy of the orchestration engine.
///
/// Per-attempt errors never escape a subtask: they end up as the `error`
/// string of a `SwarmTaskResult`. Run-level variants end up as the `error`
/// of a `SwarmExecutionResult`.
#[derive(Debug, Clone, Error)]
pub enum SwarmError {
    #[error("decomposition failed: no subtasks produced for '{0}'")]
    DecompositionFailed(String),

    #[error("no worker available")]
    NoWorkerAvailable,

    #[error("subtask timed out after {0} ms")]
    Timeout(u64),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("critical subtask '{0}' failed; remaining stages skipped")]
    CriticalTaskFailure(String),

    #[error("{failed} of {total} subtasks failed")]
    AggregateFailure { failed: usize, total: usize },

    #[error("dependency cycle or unknown dependency among subtasks: {0:?}")]
    CycleDetected(Vec<String>),

    #[error("gate check failed: {0}")]
    GateRejected(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CapabilityError> for SwarmError {
    fn from(err: CapabilityError) -> Self {
        SwarmError::ExecutionError(err.to_string())
    }
}

impl From<ContextError> for SwarmError {
    fn from(err: ContextError) -> Self {
        SwarmError::ExecutionError(err.to_string())
    }
}
