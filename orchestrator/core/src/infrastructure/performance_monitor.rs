// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Performance Monitor
//!
//! Lock-free success/failure accounting, shared by every concurrently running
//! subtask, plus on-demand device load sampling.
//!
//! Snapshots are recomputed on every call and never cached. `get_metrics`
//! performs blocking I/O through the device source; async code should use
//! [`PerformanceMonitor::sample`] which moves it onto the blocking pool.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::metrics::{DeviceLoad, DeviceMetricsSource, PerformanceMetrics, WorkerStats};

#[derive(Debug, Default)]
struct WorkerCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    total_duration_ms: AtomicU64,
}

pub struct PerformanceMonitor {
    source: Arc<dyn DeviceMetricsSource>,
    fallback: DeviceLoad,
    successes: AtomicU64,
    failures: AtomicU64,
    recovered: AtomicU64,
    total_duration_ms: AtomicU64,
    concurrency: AtomicUsize,
    workers: DashMap<String, WorkerCounters>,
}

impl PerformanceMonitor {
    pub fn new(source: Arc<dyn DeviceMetricsSource>) -> Self {
        Self::with_fallback(source, DeviceLoad::fallback())
    }

    /// `fallback` supplies each reading the source cannot provide.
    pub fn with_fallback(source: Arc<dyn DeviceMetricsSource>, fallback: DeviceLoad) -> Self {
        Self {
            source,
            fallback,
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            concurrency: AtomicUsize::new(0),
            workers: DashMap::new(),
        }
    }

    /// Worker pool size reported as `concurrency`.
    pub fn set_concurrency(&self, pool_size: usize) {
        self.concurrency.store(pool_size, Ordering::Relaxed);
    }

    pub fn record_success(&self, worker_id: &str, duration: Duration) {
        let millis = duration.as_millis() as u64;
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(millis, Ordering::Relaxed);

        let counters = self.workers.entry(worker_id.to_string()).or_default();
        counters.successes.fetch_add(1, Ordering::Relaxed);
        counters.total_duration_ms.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn record_failure(&self, worker_id: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.workers
            .entry(worker_id.to_string())
            .or_default()
            .failures
            .fetch_add(1, Ordering::Relaxed);
    }

    /// A success that needed more than one attempt. Called in addition to
    /// `record_success`.
    pub fn record_recovery(&self) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_stats(&self, worker_id: &str) -> WorkerStats {
        self.workers
            .get(worker_id)
            .map(|c| WorkerStats {
                successes: c.successes.load(Ordering::Relaxed),
                failures: c.failures.load(Ordering::Relaxed),
                total_duration_ms: c.total_duration_ms.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Sample the device now. Blocking.
    pub fn device_load(&self) -> DeviceLoad {
        let cpu = self.source.cpu_usage().unwrap_or_else(|| {
            debug!("CPU usage unavailable, using fallback {}", self.fallback.cpu_usage);
            self.fallback.cpu_usage
        });
        let memory = self.source.memory_usage().unwrap_or_else(|| {
            debug!("Memory usage unavailable, using fallback {}", self.fallback.memory_usage);
            self.fallback.memory_usage
        });
        let temperature = self.source.temperature().unwrap_or_else(|| {
            debug!("Temperature unavailable, using fallback {}", self.fallback.temperature);
            self.fallback.temperature
        });
        DeviceLoad::new(cpu, memory, temperature)
    }

    /// Full snapshot including a fresh device sample. Blocking.
    pub fn get_metrics(&self) -> PerformanceMetrics {
        self.metrics_with_load(self.device_load())
    }

    /// Full snapshot sampled on the blocking pool. Falls back to the
    /// configured device constants if the sampling task dies.
    pub async fn sample(self: &Arc<Self>) -> PerformanceMetrics {
        let monitor = Arc::clone(self);
        match tokio::task::spawn_blocking(move || monitor.get_metrics()).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("Device metrics sampling failed: {}", e);
                self.metrics_with_load(self.fallback)
            }
        }
    }

    pub fn metrics_with_load(&self, load: DeviceLoad) -> PerformanceMetrics {
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let recovered = self.recovered.load(Ordering::Relaxed);
        let total_duration = self.total_duration_ms.load(Ordering::Relaxed);
        let total = successes + failures;

        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        PerformanceMetrics {
            total_tasks: total,
            avg_execution_time_ms: ratio(total_duration, successes),
            concurrency: self.concurrency.load(Ordering::Relaxed),
            success_rate: ratio(successes, total),
            failure_rate: ratio(failures, total),
            total_failures: failures,
            recovery_rate: ratio(recovered, recovered + failures),
            cpu_usage: load.cpu_usage,
            memory_usage: load.memory_usage,
            temperature: load.temperature,
        }
    }

    pub fn reset(&self) {
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.recovered.store(0, Ordering::Relaxed);
        self.total_duration_ms.store(0, Ordering::Relaxed);
        self.workers.clear();
    }
}
