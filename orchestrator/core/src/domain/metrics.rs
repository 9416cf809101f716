// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Performance Metrics
//!
//! Snapshot types for the performance monitor and the contract for the
//! device load source it samples.

use serde::{Deserialize, Serialize};

pub const FALLBACK_CPU_PERCENT: f64 = 50.0;
pub const FALLBACK_MEMORY_PERCENT: f64 = 50.0;
pub const FALLBACK_TEMPERATURE_C: f64 = 35.0;

/// Device load at one instant. Percentages are 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceLoad {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub temperature: f64,
}

impl DeviceLoad {
    pub const fn new(cpu_usage: f64, memory_usage: f64, temperature: f64) -> Self {
        Self {
            cpu_usage,
            memory_usage,
            temperature,
        }
    }

    pub const fn fallback() -> Self {
        Self::new(FALLBACK_CPU_PERCENT, FALLBACK_MEMORY_PERCENT, FALLBACK_TEMPERATURE_C)
    }
}

impl Default for DeviceLoad {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Source of raw device readings. Each reading is independently optional;
/// `None` means the underlying source was unavailable.
///
/// Implementations may block on I/O. Async callers go through
/// `tokio::task::spawn_blocking`.
pub trait DeviceMetricsSource: Send + Sync {
    fn cpu_usage(&self) -> Option<f64>;
    fn memory_usage(&self) -> Option<f64>;
    fn temperature(&self) -> Option<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Subtasks with a recorded final outcome.
    pub total_tasks: u64,
    pub avg_execution_time_ms: f64,
    /// Size of the worker pool.
    pub concurrency: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub total_failures: u64,
    /// Share of tasks that hit at least one failed attempt and still succeeded.
    pub recovery_rate: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub temperature: f64,
}

impl PerformanceMetrics {
    pub fn device_load(&self) -> DeviceLoad {
        DeviceLoad::new(self.cpu_usage, self.memory_usage, self.temperature)
    }
}

/// Per-worker success/failure counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
}
