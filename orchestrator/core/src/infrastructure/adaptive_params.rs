// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Adaptive Parameters
//!
//! Rolling per-task-type statistics and the retry/timeout/confidence policy
//! derived from them.
//!
//! | Policy | Rule |
//! |--------|------|
//! | retry count | success rate < 0.7 → 5, < 0.9 → 3, else 1 |
//! | timeout | `max(2000, 2 × avg duration)` ms, 10000 ms with no samples |
//! | confidence threshold | 0.85 / 0.75 / 0.65 by success rate, −0.05 per attempt, floor 0.5 |
//! | fallback | more than 5 failures among the last 10 outcomes |

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

pub const RECENT_WINDOW: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const MIN_TIMEOUT_MS: u64 = 2_000;
const FALLBACK_FAILURE_LIMIT: usize = 5;
const CONFIDENCE_FLOOR: f64 = 0.5;
const CONFIDENCE_STEP: f64 = 0.05;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTypeStats {
    pub total_count: u64,
    pub success_count: u64,
    pub total_duration_ms: u64,
    /// Most recent outcome last; at most `RECENT_WINDOW` entries.
    pub recent_results: VecDeque<bool>,
}

impl TaskTypeStats {
    /// 1.0 with no samples, so an unseen type starts on the optimistic policy.
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            1.0
        } else {
            self.success_count as f64 / self.total_count as f64
        }
    }

    pub fn avg_duration_ms(&self) -> Option<f64> {
        (self.total_count > 0).then(|| self.total_duration_ms as f64 / self.total_count as f64)
    }

    pub fn recent_failures(&self) -> usize {
        self.recent_results.iter().filter(|ok| !**ok).count()
    }

    fn push(&mut self, success: bool, duration: Duration) {
        self.total_count += 1;
        if success {
            self.success_count += 1;
        }
        self.total_duration_ms += duration.as_millis() as u64;
        if self.recent_results.len() == RECENT_WINDOW {
            self.recent_results.pop_front();
        }
        self.recent_results.push_back(success);
    }
}

/// Thread-safe store keyed by task type name.
#[derive(Debug, Default)]
pub struct AdaptiveParamsManager {
    stats: DashMap<String, TaskTypeStats>,
}

impl AdaptiveParamsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task_type: &str, success: bool, duration: Duration) {
        self.stats
            .entry(task_type.to_string())
            .or_default()
            .push(success, duration);
    }

    pub fn stats(&self, task_type: &str) -> TaskTypeStats {
        self.stats.get(task_type).map(|s| s.clone()).unwrap_or_default()
    }

    pub fn get_retry_count(&self, task_type: &str) -> u32 {
        let rate = self.stats(task_type).success_rate();
        if rate < 0.7 {
            5
        } else if rate < 0.9 {
            3
        } else {
            1
        }
    }

    pub fn get_timeout(&self, task_type: &str) -> Duration {
        let millis = match self.stats(task_type).avg_duration_ms() {
            Some(avg) => (2.0 * avg).max(MIN_TIMEOUT_MS as f64) as u64,
            None => DEFAULT_TIMEOUT_MS,
        };
        Duration::from_millis(millis)
    }

    pub fn get_confidence_threshold(&self, task_type: &str, attempt: u32) -> f64 {
        let rate = self.stats(task_type).success_rate();
        let base = if rate > 0.9 {
            0.85
        } else if rate > 0.8 {
            0.75
        } else {
            0.65
        };
        (base - CONFIDENCE_STEP * attempt as f64).max(CONFIDENCE_FLOOR)
    }

    pub fn should_use_fallback(&self, task_type: &str) -> bool {
        self.stats(task_type).recent_failures() > FALLBACK_FAILURE_LIMIT
    }

    pub fn reset(&self) {
        self.stats.clear();
    }
}
