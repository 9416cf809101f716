// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Guard Agent
//!
//! Admission checks before a subtask is dispatched and a sanity check on its
//! result afterwards. Violations are reported as data (issues + risk), never
//! as errors.
//!
//! A required data key is satisfied by the subtask's own `data` or, failing
//! that, by the run context.

use std::ops::RangeInclusive;

use crate::domain::agent::{Agent, AgentCapability, AgentRole};
use crate::domain::context::ContextMap;
use crate::domain::execution::SwarmTaskResult;
use crate::domain::gate::{GateCheckResult, RiskLevel, VerificationResult};
use crate::domain::subtask::{SubTask, TaskType, CRITICAL_PRIORITY};

pub const RATING_RANGE: RangeInclusive<u8> = 1..=10;
pub const TIMEOUT_RANGE_MS: RangeInclusive<u64> = 1_000..=300_000;
pub const RETRY_RANGE: RangeInclusive<u32> = 1..=5;

const GUARD_CAPABILITY: AgentCapability = AgentCapability::new(10, 8, 10, 10);

pub struct GuardAgent {
    id: String,
}

impl GuardAgent {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn required_keys(task_type: TaskType) -> &'static [&'static str] {
        match task_type {
            TaskType::Click => &["target"],
            TaskType::Input => &["target", "text"],
            TaskType::Verify => &["condition"],
            TaskType::Composite => &["steps"],
            TaskType::Scroll | TaskType::Wait | TaskType::Analyze => &[],
        }
    }

    pub fn check_before_execution(&self, task: &SubTask, context: &ContextMap) -> GateCheckResult {
        let mut issues = Vec::new();

        for key in Self::required_keys(task.task_type) {
            if !task.data.contains_key(*key) && !context.contains_key(*key) {
                issues.push(format!("{} task '{}' is missing required key '{}'", task.task_type, task.id, key));
            }
        }

        if !RATING_RANGE.contains(&task.complexity) {
            issues.push(format!("complexity {} outside [1, 10]", task.complexity));
        }
        if !RATING_RANGE.contains(&task.priority) {
            issues.push(format!("priority {} outside [1, 10]", task.priority));
        }
        if !TIMEOUT_RANGE_MS.contains(&task.timeout_ms) {
            issues.push(format!("timeout {} ms outside [1000, 300000]", task.timeout_ms));
        }
        if !RETRY_RANGE.contains(&task.retry_count) {
            issues.push(format!("retry count {} outside [1, 5]", task.retry_count));
        }

        let risk = if !issues.is_empty() {
            RiskLevel::High
        } else if task.priority >= CRITICAL_PRIORITY || task.complexity >= 8 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        GateCheckResult {
            passed: issues.is_empty(),
            issues,
            risk,
        }
    }

    /// `verified` holds whenever the task succeeded, even if issues were
    /// flagged; the issues are still returned.
    pub fn verify_result(&self, task: &SubTask, result: &SwarmTaskResult) -> VerificationResult {
        let mut issues = Vec::new();

        if result.message().is_empty() {
            issues.push(format!("task '{}' produced an empty result message", task.id));
        }
        if task.is_critical() && !result.success {
            issues.push(format!(
                "critical task '{}' (priority {}) failed",
                task.id, task.priority
            ));
        }

        let mut confidence = if result.success { 1.0 } else { 0.6 };
        confidence -= 0.3 * issues.len() as f64;

        VerificationResult {
            verified: issues.is_empty() || result.success,
            issues,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl Default for GuardAgent {
    fn default() -> Self {
        Self::new("guard")
    }
}

impl Agent for GuardAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Guard
    }

    fn capability(&self) -> AgentCapability {
        GUARD_CAPABILITY
    }

    fn can_handle(&self, _task: &SubTask) -> bool {
        true
    }
}
