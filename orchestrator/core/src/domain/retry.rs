// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Backoff Policy
//!
//! Delay inserted between retry attempts:
//! `min(max_delay, base_delay * multiplier^attempt)` with a 0-based attempt
//! index. Shared by the queen's subtask loop and `SmartRetryStrategy`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, multiplier: f64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            multiplier,
            max_delay_ms,
        }
    }

    /// Delay to wait after the failed attempt with index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms =
            (self.base_delay_ms as f64 * self.multiplier.powi(exponent)).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}
