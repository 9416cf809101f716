// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SubTask
//!
//! A `SubTask` is one UI-level unit of work produced by the decomposer. Once
//! emitted it is never mutated; results carry derived state instead.
//!
//! Range constraints (complexity, priority, timeout, retry count) are checked
//! by the guard agent at admission time, so an out-of-range subtask is data
//! to report, not a construction failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::context::{ContextMap, ContextValue};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Priority at or above which a failed subtask is treated as critical.
pub const CRITICAL_PRIORITY: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Click,
    Input,
    Scroll,
    Wait,
    Verify,
    Analyze,
    Composite,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Click => "CLICK",
            TaskType::Input => "INPUT",
            TaskType::Scroll => "SCROLL",
            TaskType::Wait => "WAIT",
            TaskType::Verify => "VERIFY",
            TaskType::Analyze => "ANALYZE",
            TaskType::Composite => "COMPOSITE",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CLICK" => Ok(TaskType::Click),
            "INPUT" => Ok(TaskType::Input),
            "SCROLL" => Ok(TaskType::Scroll),
            "WAIT" => Ok(TaskType::Wait),
            "VERIFY" => Ok(TaskType::Verify),
            "ANALYZE" => Ok(TaskType::Analyze),
            "COMPOSITE" => Ok(TaskType::Composite),
            other => Err(format!("unknown task type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique within one decomposition.
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub description: String,
    /// 1-10
    pub complexity: u8,
    /// 1-10
    pub priority: u8,
    /// Ids of subtasks declared earlier in the same decomposition.
    pub dependencies: BTreeSet<String>,
    pub timeout_ms: u64,
    pub retry_count: u32,
    #[serde(default)]
    pub data: ContextMap,
}

impl SubTask {
    pub fn new(id: impl Into<String>, task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type,
            description: description.into(),
            complexity: 1,
            priority: 5,
            dependencies: BTreeSet::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            data: ContextMap::new(),
        }
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_data_map(mut self, data: ContextMap) -> Self {
        self.data = data;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_critical(&self) -> bool {
        self.priority >= CRITICAL_PRIORITY
    }

    /// True when every dependency id is contained in `completed`.
    pub fn dependencies_satisfied(&self, completed: &BTreeSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_admission_ranges() {
        let task = SubTask::new("t1", TaskType::Click, "tap ok");
        assert_eq!(task.timeout_ms, 30_000);
        assert_eq!(task.retry_count, 3);
        assert!(task.dependencies.is_empty());
        assert!(!task.is_critical());
    }

    #[test]
    fn dependencies_satisfied_requires_every_id() {
        let task = SubTask::new("c", TaskType::Input, "type")
            .with_dependency("a")
            .with_dependency("b");
        let mut done = BTreeSet::new();
        done.insert("a".to_string());
        assert!(!task.dependencies_satisfied(&done));
        done.insert("b".to_string());
        assert!(task.dependencies_satisfied(&done));
    }

    #[test]
    fn task_type_parses_case_insensitively() {
        assert_eq!("scroll".parse::<TaskType>().unwrap(), TaskType::Scroll);
        assert_eq!("COMPOSITE".parse::<TaskType>().unwrap(), TaskType::Composite);
        assert!("swipe".parse::<TaskType>().is_err());
    }

    #[test]
    fn task_type_serializes_upper_case() {
        let json = serde_json::to_string(&TaskType::Verify).unwrap();
        assert_eq!(json, "\"VERIFY\"");
    }
}
