// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Scheduler
//!
//! Layers the subtask dependency graph into sequential stages and picks how
//! many workers may run, based on a fresh device load sample.
//!
//! | Device load (first match wins) | Active workers |
//! |--------------------------------|----------------|
//! | CPU > 80% or memory > 80% or temperature > 45°C | 1 |
//! | CPU > 60% or memory > 60% or temperature > 40°C | 2 |
//! | CPU > 40% or memory > 40% | 3 |
//! | otherwise | `min(max_active_workers, pool size)` |

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::worker::WorkerAgent;
use crate::domain::agent::Agent;
use crate::domain::error::SwarmError;
use crate::domain::execution::ExecutionStage;
use crate::domain::metrics::DeviceLoad;
use crate::domain::subtask::SubTask;
use crate::domain::swarm_config::CyclePolicy;
use crate::infrastructure::performance_monitor::PerformanceMonitor;

pub const DEFAULT_MAX_ACTIVE_WORKERS: usize = 5;

/// Stages to run in order, plus the workers allowed to run them.
#[derive(Clone, Default)]
pub struct ExecutionPlan {
    pub stages: Vec<ExecutionStage>,
    pub workers: Vec<Arc<WorkerAgent>>,
}

impl ExecutionPlan {
    pub fn total_tasks(&self) -> usize {
        self.stages.iter().map(|s| s.tasks.len()).sum()
    }
}

impl fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<Vec<&str>> = self.stages.iter().map(|s| s.task_ids()).collect();
        let workers: Vec<&str> = self.workers.iter().map(|w| w.id()).collect();
        f.debug_struct("ExecutionPlan")
            .field("stages", &stages)
            .field("workers", &workers)
            .finish()
    }
}

pub struct SwarmScheduler {
    monitor: Arc<PerformanceMonitor>,
    cycle_policy: CyclePolicy,
    max_active_workers: usize,
}

impl SwarmScheduler {
    pub fn new(monitor: Arc<PerformanceMonitor>) -> Self {
        Self {
            monitor,
            cycle_policy: CyclePolicy::default(),
            max_active_workers: DEFAULT_MAX_ACTIVE_WORKERS,
        }
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_max_active_workers(mut self, max: usize) -> Self {
        self.max_active_workers = max.max(1);
        self
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        self.cycle_policy
    }

    /// Kahn layering. Each stage holds every remaining task whose
    /// dependencies are all in earlier stages, in input order. Tasks that can
    /// never become ready (cycle or unknown id) are either forced into one
    /// final stage or rejected, per the cycle policy.
    pub fn build_execution_stages(&self, tasks: &[SubTask]) -> Result<Vec<ExecutionStage>, SwarmError> {
        let mut completed: BTreeSet<String> = BTreeSet::new();
        let mut remaining: Vec<SubTask> = tasks.to_vec();
        let mut stages = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<SubTask>, Vec<SubTask>) = remaining
                .into_iter()
                .partition(|t| t.dependencies_satisfied(&completed));

            if ready.is_empty() {
                let stuck: Vec<String> = blocked.iter().map(|t| t.id.clone()).collect();
                match self.cycle_policy {
                    CyclePolicy::Reject => return Err(SwarmError::CycleDetected(stuck)),
                    CyclePolicy::ForceFinalStage => {
                        warn!(
                            tasks = ?stuck,
                            "Unsatisfiable dependencies, forcing remaining tasks into a final stage"
                        );
                        stages.push(ExecutionStage::new(blocked));
                        break;
                    }
                }
            }

            completed.extend(ready.iter().map(|t| t.id.clone()));
            stages.push(ExecutionStage::new(ready));
            remaining = blocked;
        }

        Ok(stages)
    }

    /// Target active worker count for a device load and pool size.
    pub fn active_worker_target(&self, load: &DeviceLoad, pool_size: usize) -> usize {
        let DeviceLoad {
            cpu_usage: cpu,
            memory_usage: memory,
            temperature,
        } = *load;

        let n = if cpu > 80.0 || memory > 80.0 || temperature > 45.0 {
            1
        } else if cpu > 60.0 || memory > 60.0 || temperature > 40.0 {
            2
        } else if cpu > 40.0 || memory > 40.0 {
            3
        } else {
            self.max_active_workers
        };
        n.min(pool_size)
    }

    /// Sample the device and keep the first `n` workers of `pool`.
    pub async fn adjust_worker_count(&self, pool: &[Arc<WorkerAgent>]) -> Vec<Arc<WorkerAgent>> {
        let load = self.monitor.sample().await.device_load();
        let n = self.active_worker_target(&load, pool.len());
        debug!(
            cpu = load.cpu_usage,
            memory = load.memory_usage,
            temperature = load.temperature,
            active = n,
            pool = pool.len(),
            "Throttled worker pool"
        );
        metrics::gauge!("droidswarm_active_workers").set(n as f64);
        pool.iter().take(n).cloned().collect()
    }

    pub async fn schedule(
        &self,
        tasks: &[SubTask],
        pool: &[Arc<WorkerAgent>],
    ) -> Result<ExecutionPlan, SwarmError> {
        let stages = self.build_execution_stages(tasks)?;
        let workers = self.adjust_worker_count(pool).await;
        info!(
            stages = stages.len(),
            tasks = tasks.len(),
            workers = workers.len(),
            "Execution plan ready"
        );
        Ok(ExecutionPlan { stages, workers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentCapability;
    use crate::domain::subtask::TaskType;
    use crate::infrastructure::device_metrics::StaticDeviceMetrics;
    use crate::infrastructure::simulated::SimulatedExecutor;

    fn scheduler(load: DeviceLoad) -> SwarmScheduler {
        SwarmScheduler::new(Arc::new(PerformanceMonitor::new(Arc::new(
            StaticDeviceMetrics::new(load),
        ))))
    }

    fn pool(n: usize) -> Vec<Arc<WorkerAgent>> {
        (0..n)
            .map(|i| {
                Arc::new(WorkerAgent::new(
                    format!("worker-{}", i + 1),
                    AgentCapability::new(8, 8, 8, 8),
                    Arc::new(SimulatedExecutor::new()),
                ))
            })
            .collect()
    }

    fn task(id: &str, deps: &[&str]) -> SubTask {
        deps.iter()
            .fold(SubTask::new(id, TaskType::Wait, id), |t, d| t.with_dependency(*d))
    }

    fn stage_ids(stages: &[ExecutionStage]) -> Vec<Vec<&str>> {
        stages.iter().map(|s| s.task_ids()).collect()
    }

    #[test]
    fn layers_diamond_graph() {
        let s = scheduler(DeviceLoad::fallback());
        let tasks = vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
            task("e", &[]),
        ];
        let stages = s.build_execution_stages(&tasks).unwrap();
        assert_eq!(stage_ids(&stages), vec![vec!["a", "e"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn cycle_is_forced_into_final_stage_by_default() {
        let s = scheduler(DeviceLoad::fallback());
        let tasks = vec![task("a", &[]), task("b", &["c"]), task("c", &["b"]), task("d", &["ghost"])];
        let stages = s.build_execution_stages(&tasks).unwrap();
        assert_eq!(stage_ids(&stages), vec![vec!["a"], vec!["b", "c", "d"]]);
    }

    #[test]
    fn cycle_is_rejected_under_reject_policy() {
        let s = scheduler(DeviceLoad::fallback()).with_cycle_policy(CyclePolicy::Reject);
        let tasks = vec![task("a", &[]), task("b", &["b"])];
        match s.build_execution_stages(&tasks) {
            Err(SwarmError::CycleDetected(ids)) => assert_eq!(ids, vec!["b".to_string()]),
            other => panic!("expected cycle error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn empty_input_has_no_stages() {
        let s = scheduler(DeviceLoad::fallback());
        assert!(s.build_execution_stages(&[]).unwrap().is_empty());
    }

    #[test]
    fn throttle_tiers() {
        let s = scheduler(DeviceLoad::fallback());
        let target = |cpu, mem, temp, pool| s.active_worker_target(&DeviceLoad::new(cpu, mem, temp), pool);
        assert_eq!(target(85.0, 20.0, 30.0, 10), 1);
        assert_eq!(target(20.0, 20.0, 46.0, 10), 1);
        assert_eq!(target(65.0, 20.0, 30.0, 10), 2);
        assert_eq!(target(20.0, 20.0, 41.0, 10), 2);
        assert_eq!(target(20.0, 45.0, 30.0, 10), 3);
        // temperature alone does not reach the third tier
        assert_eq!(target(20.0, 20.0, 39.0, 10), 5);
        assert_eq!(target(35.0, 20.0, 30.0, 3), 3);
        assert_eq!(target(85.0, 20.0, 30.0, 0), 0);
    }

    #[tokio::test]
    async fn schedule_uses_live_load() {
        let s = scheduler(DeviceLoad::new(35.0, 20.0, 30.0));
        let workers = pool(8);
        let plan = s
            .schedule(&[task("a", &[]), task("b", &["a"])], &workers)
            .await
            .unwrap();
        assert_eq!(plan.total_tasks(), 2);
        assert_eq!(plan.workers.len(), 5);
        assert_eq!(plan.workers[0].id(), "worker-1");

        let hot = scheduler(DeviceLoad::new(85.0, 20.0, 30.0));
        assert_eq!(hot.adjust_worker_count(&workers).await.len(), 1);
    }
}
