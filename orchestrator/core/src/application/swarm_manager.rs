// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Manager
//!
//! Composition root of the orchestration engine. Builds every service from a
//! [`SwarmConfigSpec`] and the three device collaborators, owns them for
//! its lifetime, and exposes the public surface the host application calls.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::decomposer::TaskDecomposer;
use crate::application::guard::GuardAgent;
use crate::application::queen::{DispatchMode, QueenAgent, QueenSettings, SwarmServices};
use crate::application::retry_strategy::SmartRetryStrategy;
use crate::application::scheduler::SwarmScheduler;
use crate::application::scout::{ScoutAgent, ScreenEnvironment};
use crate::application::worker::WorkerAgent;
use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::capability::{Executor, Vision};
use crate::domain::context::ContextMap;
use crate::domain::error::SwarmError;
use crate::domain::execution::SwarmExecutionResult;
use crate::domain::gate::GateCheckResult;
use crate::domain::metrics::{DeviceLoad, DeviceMetricsSource, PerformanceMetrics};
use crate::domain::subtask::SubTask;
use crate::domain::swarm_config::SwarmConfigSpec;
use crate::infrastructure::adaptive_params::AdaptiveParamsManager;
use crate::infrastructure::device_metrics::ProcDeviceMetrics;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::performance_monitor::PerformanceMonitor;

/// Status of every agent in the swarm, grouped by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmStatus {
    pub queen: AgentStatus,
    pub workers: Vec<AgentStatus>,
    pub scout: AgentStatus,
    pub guard: AgentStatus,
}

pub struct SwarmManager {
    queen: Arc<QueenAgent>,
    scout: ScoutAgent,
    guard: Arc<GuardAgent>,
    decomposer: TaskDecomposer,
    monitor: Arc<PerformanceMonitor>,
    params: Arc<AdaptiveParamsManager>,
    event_bus: EventBus,
}

impl SwarmManager {
    pub fn new(
        config: &SwarmConfigSpec,
        executor: Arc<dyn Executor>,
        vision: Arc<dyn Vision>,
        device: Arc<dyn DeviceMetricsSource>,
    ) -> Self {
        let fallback = DeviceLoad::new(
            config.device_metrics.fallback_cpu_percent,
            config.device_metrics.fallback_memory_percent,
            config.device_metrics.fallback_temperature_c,
        );
        let monitor = Arc::new(PerformanceMonitor::with_fallback(device, fallback));
        let params = Arc::new(AdaptiveParamsManager::new());
        let event_bus = EventBus::with_default_capacity();
        let guard = Arc::new(GuardAgent::new("guard"));
        let decomposer = TaskDecomposer::new();

        let scheduler = Arc::new(
            SwarmScheduler::new(Arc::clone(&monitor))
                .with_cycle_policy(config.scheduler.cycle_policy)
                .with_max_active_workers(config.scheduler.max_active_workers),
        );

        let workers: Vec<Arc<WorkerAgent>> = config
            .workers
            .iter()
            .map(|w| Arc::new(WorkerAgent::new(w.id.clone(), w.capability, Arc::clone(&executor))))
            .collect();

        let services = SwarmServices {
            decomposer,
            scheduler,
            guard: Arc::clone(&guard),
            monitor: Arc::clone(&monitor),
            params: Arc::clone(&params),
            event_bus: event_bus.clone(),
        };
        let settings = QueenSettings {
            backoff: config.retry,
            enforce_gate: config.execution.enforce_gate,
            adaptive_retry: config.execution.adaptive_retry,
        };
        let queen = Arc::new(QueenAgent::new("queen", services, workers, settings));

        let retry = Arc::new(SmartRetryStrategy::new(Arc::clone(&params), config.retry));
        let scout = ScoutAgent::new("scout", vision, retry);

        info!(
            workers = queen.workers().len(),
            enforce_gate = config.execution.enforce_gate,
            adaptive_retry = config.execution.adaptive_retry,
            "Swarm initialized"
        );

        Self {
            queen,
            scout,
            guard,
            decomposer,
            monitor,
            params,
            event_bus,
        }
    }

    /// Device load read from procfs and the configured thermal zone.
    pub fn with_proc_metrics(config: &SwarmConfigSpec, executor: Arc<dyn Executor>, vision: Arc<dyn Vision>) -> Self {
        let device = Arc::new(ProcDeviceMetrics::new(config.device_metrics.thermal_zone.clone()));
        Self::new(config, executor, vision, device)
    }

    /// `use_swarm = false` runs in degraded single-worker mode.
    pub async fn execute_task(&self, description: &str, context: &ContextMap, use_swarm: bool) -> SwarmExecutionResult {
        self.execute_task_with_cancellation(description, context, use_swarm, CancellationToken::new())
            .await
    }

    pub async fn execute_task_with_cancellation(
        &self,
        description: &str,
        context: &ContextMap,
        use_swarm: bool,
        cancel: CancellationToken,
    ) -> SwarmExecutionResult {
        let mode = if use_swarm {
            DispatchMode::Swarm
        } else {
            DispatchMode::SingleWorker
        };
        self.queen.execute(description, context, mode, cancel).await
    }

    pub async fn explore_screen(&self) -> Result<ScreenEnvironment, SwarmError> {
        self.scout.explore_screen().await
    }

    pub fn check_task(&self, task: &SubTask, context: &ContextMap) -> GateCheckResult {
        self.guard.check_before_execution(task, context)
    }

    pub fn decompose(&self, description: &str, context: &ContextMap) -> Vec<SubTask> {
        self.decomposer.decompose(description, context)
    }

    pub async fn get_metrics(&self) -> PerformanceMetrics {
        self.monitor.sample().await
    }

    pub fn get_agent_status(&self) -> SwarmStatus {
        SwarmStatus {
            queen: self.queen.status(),
            workers: self.queen.workers().iter().map(|w| w.status()).collect(),
            scout: self.scout.status(),
            guard: self.guard.status(),
        }
    }

    /// Clears execution counters and adaptive statistics.
    pub fn reset_metrics(&self) {
        self.monitor.reset();
        self.params.reset();
        info!("Swarm metrics reset");
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn adaptive_params(&self) -> &Arc<AdaptiveParamsManager> {
        &self.params
    }
}
