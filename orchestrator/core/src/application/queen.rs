// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Queen Agent
//!
//! Coordinates one orchestration run:
//!
//! 1. decompose the description into subtasks
//! 2. schedule them into stages over the throttled worker subset
//! 3. run each stage's subtasks concurrently and wait for all of them
//! 4. stop before the next stage if a critical subtask (priority ≥ 8) failed
//! 5. aggregate
//!
//! Every subtask runs in its own tokio task bounded by a per-stage semaphore
//! sized to the active worker count. Results come back in submission order,
//! so the final result list follows stage order. The run never returns an
//! error: every failure path ends in a [`SwarmExecutionResult`].

use chrono::Utc;
use futures::future::join_all;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::decomposer::TaskDecomposer;
use crate::application::guard::GuardAgent;
use crate::application::retry_strategy::{run_attempts, AttemptsFailed};
use crate::application::scheduler::{ExecutionPlan, SwarmScheduler};
use crate::application::worker::{WorkerAgent, WorkerLease};
use crate::domain::agent::{Agent, AgentCapability, AgentRole, AgentStatus};
use crate::domain::capability::ActionResult;
use crate::domain::context::ContextMap;
use crate::domain::error::SwarmError;
use crate::domain::events::SwarmEvent;
use crate::domain::execution::{ExecutionStage, RunId, SwarmExecutionResult, SwarmTaskResult};
use crate::domain::retry::BackoffPolicy;
use crate::domain::subtask::SubTask;
use crate::infrastructure::adaptive_params::AdaptiveParamsManager;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::performance_monitor::PerformanceMonitor;

const QUEEN_CAPABILITY: AgentCapability = AgentCapability::new(10, 10, 10, 10);

#[derive(Debug, Clone, Default)]
pub struct QueenSettings {
    pub backoff: BackoffPolicy,
    /// Fail subtasks that do not pass the guard's pre-execution check.
    pub enforce_gate: bool,
    /// Raise attempt counts and timeouts from per-type statistics.
    pub adaptive_retry: bool,
}

/// Services the queen drives. Owned by the composition root.
#[derive(Clone)]
pub struct SwarmServices {
    pub decomposer: TaskDecomposer,
    pub scheduler: Arc<SwarmScheduler>,
    pub guard: Arc<GuardAgent>,
    pub monitor: Arc<PerformanceMonitor>,
    pub params: Arc<AdaptiveParamsManager>,
    pub event_bus: EventBus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Staged concurrent dispatch over the throttled pool.
    Swarm,
    /// One subtask per stage, in declared order, on the most capable worker.
    SingleWorker,
}

/// Last failed attempt of a subtask.
struct AttemptFailure {
    error: SwarmError,
    response: Option<ActionResult>,
}

impl AttemptFailure {
    fn new(error: SwarmError) -> Self {
        Self { error, response: None }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

pub struct QueenAgent {
    id: String,
    services: SwarmServices,
    workers: Vec<Arc<WorkerAgent>>,
    settings: QueenSettings,
    active_runs: AtomicUsize,
    runs_completed: AtomicU64,
}

impl QueenAgent {
    pub fn new(
        id: impl Into<String>,
        services: SwarmServices,
        workers: Vec<Arc<WorkerAgent>>,
        settings: QueenSettings,
    ) -> Self {
        services.monitor.set_concurrency(workers.len());
        Self {
            id: id.into(),
            services,
            workers,
            settings,
            active_runs: AtomicUsize::new(0),
            runs_completed: AtomicU64::new(0),
        }
    }

    pub fn workers(&self) -> &[Arc<WorkerAgent>] {
        &self.workers
    }

    pub async fn execute_swarm_task(self: &Arc<Self>, description: &str, context: &ContextMap) -> SwarmExecutionResult {
        self.execute(description, context, DispatchMode::Swarm, CancellationToken::new())
            .await
    }

    pub async fn execute_sequential(self: &Arc<Self>, description: &str, context: &ContextMap) -> SwarmExecutionResult {
        self.execute(description, context, DispatchMode::SingleWorker, CancellationToken::new())
            .await
    }

    /// Cancelling `cancel` stops dispatching new stages, aborts in-flight
    /// attempts and backoff waits, and fails the run with "cancelled".
    pub async fn execute(
        self: &Arc<Self>,
        description: &str,
        context: &ContextMap,
        mode: DispatchMode,
        cancel: CancellationToken,
    ) -> SwarmExecutionResult {
        let run_id = RunId::new();
        let started = Instant::now();
        self.active_runs.fetch_add(1, Ordering::Relaxed);

        info!(%run_id, ?mode, "Starting swarm run: {}", description);
        self.services.event_bus.publish(SwarmEvent::RunStarted {
            run_id,
            description: description.to_string(),
            started_at: Utc::now(),
        });

        let result = match self.run(run_id, description, context, mode, &cancel).await {
            Ok(result) => result,
            Err(e) => {
                error!(%run_id, "Swarm run failed: {}", e);
                let mut failed = SwarmExecutionResult::failed(run_id, e.to_string(), elapsed_ms(started));
                failed.metrics = Some(self.services.monitor.sample().await);
                failed
            }
        };

        self.active_runs.fetch_sub(1, Ordering::Relaxed);
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        let outcome = if result.success { "success" } else { "failure" };
        metrics::counter!("droidswarm_runs_total", "outcome" => outcome).increment(1);

        info!(
            %run_id,
            success = result.success,
            completed = result.completed_tasks,
            total = result.total_tasks,
            duration_ms = result.execution_time_ms,
            "Swarm run finished"
        );
        self.services.event_bus.publish(SwarmEvent::RunCompleted {
            run_id,
            success: result.success,
            completed_tasks: result.completed_tasks,
            total_tasks: result.total_tasks,
            completed_at: Utc::now(),
        });
        result
    }

    async fn run(
        self: &Arc<Self>,
        run_id: RunId,
        description: &str,
        context: &ContextMap,
        mode: DispatchMode,
        cancel: &CancellationToken,
    ) -> Result<SwarmExecutionResult, SwarmError> {
        let started = Instant::now();

        let tasks = self.services.decomposer.decompose(description, context);
        if tasks.is_empty() {
            return Err(SwarmError::DecompositionFailed(description.to_string()));
        }

        let plan = match mode {
            DispatchMode::Swarm => self.services.scheduler.schedule(&tasks, &self.workers).await?,
            DispatchMode::SingleWorker => self.sequential_plan(tasks),
        };
        debug!(%run_id, plan = ?plan, "Plan built");
        self.services.event_bus.publish(SwarmEvent::Decomposed {
            run_id,
            subtask_count: plan.total_tasks(),
            stage_count: plan.stages.len(),
            active_workers: plan.workers.len(),
        });

        let context = Arc::new(context.clone());
        let mut results = Vec::with_capacity(plan.total_tasks());
        let mut halted: Option<SwarmError> = None;

        for (index, stage) in plan.stages.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(%run_id, stage = index, "Run cancelled before stage");
                halted = Some(SwarmError::Cancelled);
                break;
            }

            self.services.event_bus.publish(SwarmEvent::StageStarted {
                run_id,
                stage_index: index,
                task_ids: stage.tasks.iter().map(|t| t.id.clone()).collect(),
            });

            let stage_results = self
                .execute_stage(run_id, stage, &plan.workers, &context, cancel)
                .await;

            let succeeded = stage_results.iter().filter(|r| r.success).count();
            self.services.event_bus.publish(SwarmEvent::StageCompleted {
                run_id,
                stage_index: index,
                succeeded,
                failed: stage_results.len() - succeeded,
            });

            let critical_failure = stage
                .tasks
                .iter()
                .zip(&stage_results)
                .find(|(task, result)| task.is_critical() && !result.success)
                .map(|(task, _)| task.id.clone());
            results.extend(stage_results);

            if cancel.is_cancelled() {
                warn!(%run_id, stage = index, "Run cancelled during stage");
                halted = Some(SwarmError::Cancelled);
                break;
            }

            if let Some(task_id) = critical_failure {
                let skipped_stages = plan.stages.len() - index - 1;
                warn!(
                    %run_id,
                    task_id = %task_id,
                    skipped_stages,
                    "Critical subtask failed, halting run"
                );
                self.services.event_bus.publish(SwarmEvent::CircuitBreakerTripped {
                    run_id,
                    stage_index: index,
                    task_id: task_id.clone(),
                    skipped_stages,
                });
                halted = Some(SwarmError::CriticalTaskFailure(task_id));
                break;
            }
        }

        let total_tasks = plan.total_tasks();
        let completed_tasks = results.iter().filter(|r| r.success).count();
        let failed_tasks = total_tasks - completed_tasks;
        let success = failed_tasks == 0;

        let error = match halted {
            Some(e) => Some(e.to_string()),
            None if !success => Some(
                SwarmError::AggregateFailure {
                    failed: failed_tasks,
                    total: total_tasks,
                }
                .to_string(),
            ),
            None => None,
        };

        Ok(SwarmExecutionResult {
            run_id,
            success,
            total_tasks,
            completed_tasks,
            failed_tasks,
            execution_time_ms: elapsed_ms(started),
            results,
            metrics: Some(self.services.monitor.sample().await),
            error,
        })
    }

    fn sequential_plan(&self, tasks: Vec<SubTask>) -> ExecutionPlan {
        let strongest = self
            .workers
            .iter()
            .max_by_key(|w| (w.capability().complexity, w.capability().score()))
            .cloned();
        ExecutionPlan {
            stages: tasks.into_iter().map(|t| ExecutionStage::new(vec![t])).collect(),
            workers: strongest.into_iter().collect(),
        }
    }

    /// Runs every subtask of `stage` concurrently, bounded by the number of
    /// workers. Results come back in stage order.
    pub async fn execute_stage(
        self: &Arc<Self>,
        run_id: RunId,
        stage: &ExecutionStage,
        workers: &[Arc<WorkerAgent>],
        context: &Arc<ContextMap>,
        cancel: &CancellationToken,
    ) -> Vec<SwarmTaskResult> {
        let permits = Arc::new(Semaphore::new(workers.len().max(1)));
        let workers: Arc<Vec<Arc<WorkerAgent>>> = Arc::new(workers.to_vec());

        let handles = stage.tasks.iter().cloned().map(|task| {
            let queen = Arc::clone(self);
            let permits = Arc::clone(&permits);
            let workers = Arc::clone(&workers);
            let context = Arc::clone(context);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                queen
                    .execute_subtask(run_id, &task, &workers, &context, &cancel)
                    .await
            })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(&stage.tasks)
            .map(|(joined, task)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(%run_id, task_id = %task.id, "Subtask dispatch aborted: {}", e);
                    let result =
                        SwarmTaskResult::unassigned(&task.id, SwarmError::Internal(e.to_string()).to_string());
                    self.finish(run_id, result)
                }
            })
            .collect()
    }

    /// Idle capable workers, least used first; the first one that can be
    /// claimed wins.
    pub fn select_worker(task: &SubTask, workers: &[Arc<WorkerAgent>]) -> Option<WorkerLease> {
        let mut candidates: Vec<&Arc<WorkerAgent>> = workers
            .iter()
            .filter(|w| w.can_handle(task) && !w.is_busy())
            .collect();
        candidates.sort_by_key(|w| w.tasks_completed());
        candidates.into_iter().find_map(|w| w.try_claim())
    }

    fn attempt_budget(&self, task: &SubTask) -> (u32, Duration) {
        let mut attempts = task.retry_count.max(1);
        let mut timeout = task.timeout();
        if self.settings.adaptive_retry {
            let task_type = task.task_type.as_str();
            attempts = attempts.max(self.services.params.get_retry_count(task_type));
            timeout = timeout.max(self.services.params.get_timeout(task_type));
        }
        (attempts, timeout)
    }

    pub async fn execute_subtask(
        &self,
        run_id: RunId,
        task: &SubTask,
        workers: &[Arc<WorkerAgent>],
        context: &ContextMap,
        cancel: &CancellationToken,
    ) -> SwarmTaskResult {
        let gate = self.services.guard.check_before_execution(task, context);
        if !gate.passed {
            warn!(task_id = %task.id, risk = ?gate.risk, issues = ?gate.issues, "Gate check flagged subtask");
            if self.settings.enforce_gate {
                let error = SwarmError::GateRejected(gate.issues.join("; "));
                return self.finish(run_id, SwarmTaskResult::unassigned(&task.id, error.to_string()));
            }
        }

        if cancel.is_cancelled() {
            return self.finish(run_id, SwarmTaskResult::unassigned(&task.id, SwarmError::Cancelled.to_string()));
        }

        let Some(lease) = Self::select_worker(task, workers) else {
            warn!(task_id = %task.id, complexity = task.complexity, "No worker available");
            return self.finish(
                run_id,
                SwarmTaskResult::unassigned(&task.id, SwarmError::NoWorkerAvailable.to_string()),
            );
        };
        let worker_id = lease.worker_id().to_string();
        let (max_attempts, timeout) = self.attempt_budget(task);

        let started = Instant::now();
        let lease_ref = &lease;
        let report = run_attempts(
            max_attempts,
            &self.settings.backoff,
            cancel,
            &task.id,
            move |attempt| async move {
                debug!(
                    task_id = %task.id,
                    worker = lease_ref.worker_id(),
                    attempt = attempt + 1,
                    "Dispatching attempt"
                );
                match tokio::time::timeout(timeout, lease_ref.execute(task)).await {
                    Err(_) => Err(AttemptFailure::new(SwarmError::Timeout(timeout.as_millis() as u64))),
                    Ok(Err(e)) => Err(AttemptFailure::new(e)),
                    Ok(Ok(response)) if response.success => Ok(response),
                    Ok(Ok(response)) => Err(AttemptFailure {
                        error: SwarmError::ExecutionError(response.message.clone()),
                        response: Some(response),
                    }),
                }
            },
        )
        .await;
        drop(lease);
        let elapsed = started.elapsed();

        let task_type = task.task_type.as_str();
        let result = match report.outcome {
            Ok(response) => {
                self.services.monitor.record_success(&worker_id, elapsed);
                if report.attempts > 1 {
                    self.services.monitor.record_recovery();
                }
                self.services.params.record(task_type, true, elapsed);
                SwarmTaskResult {
                    task_id: task.id.clone(),
                    success: true,
                    result: Some(response),
                    executed_by: worker_id,
                    execution_time_ms: elapsed.as_millis() as u64,
                    attempts: report.attempts,
                    error: None,
                }
            }
            Err(AttemptsFailed::Exhausted(failure)) => {
                self.services.monitor.record_failure(&worker_id);
                self.services.params.record(task_type, false, elapsed);
                SwarmTaskResult {
                    task_id: task.id.clone(),
                    success: false,
                    result: failure.response,
                    executed_by: worker_id,
                    execution_time_ms: elapsed.as_millis() as u64,
                    attempts: report.attempts,
                    error: Some(failure.error.to_string()),
                }
            }
            Err(AttemptsFailed::Cancelled) => SwarmTaskResult {
                task_id: task.id.clone(),
                success: false,
                result: None,
                executed_by: worker_id,
                execution_time_ms: elapsed.as_millis() as u64,
                attempts: report.attempts,
                error: Some(SwarmError::Cancelled.to_string()),
            },
        };

        let verdict = self.services.guard.verify_result(task, &result);
        if !verdict.issues.is_empty() {
            debug!(
                task_id = %task.id,
                verified = verdict.verified,
                confidence = verdict.confidence,
                issues = ?verdict.issues,
                "Result verification"
            );
        }

        self.finish(run_id, result)
    }

    fn finish(&self, run_id: RunId, result: SwarmTaskResult) -> SwarmTaskResult {
        let outcome = if result.success { "success" } else { "failure" };
        metrics::counter!("droidswarm_subtasks_total", "outcome" => outcome).increment(1);
        metrics::histogram!("droidswarm_subtask_duration_ms").record(result.execution_time_ms as f64);

        if result.success {
            info!(task_id = %result.task_id, worker = %result.executed_by, attempts = result.attempts, "Subtask succeeded");
        } else {
            warn!(
                task_id = %result.task_id,
                worker = %result.executed_by,
                attempts = result.attempts,
                error = result.error.as_deref().unwrap_or(""),
                "Subtask failed"
            );
        }

        self.services.event_bus.publish(SwarmEvent::SubTaskCompleted {
            run_id,
            task_id: result.task_id.clone(),
            success: result.success,
            executed_by: result.executed_by.clone(),
            attempts: result.attempts,
            error: result.error.clone(),
        });
        result
    }
}

impl Agent for QueenAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Queen
    }

    fn capability(&self) -> AgentCapability {
        QUEEN_CAPABILITY
    }

    fn can_handle(&self, _task: &SubTask) -> bool {
        true
    }

    fn status(&self) -> AgentStatus {
        AgentStatus {
            id: self.id.clone(),
            role: AgentRole::Queen,
            capability: QUEEN_CAPABILITY,
            busy: self.active_runs.load(Ordering::Relaxed) > 0,
            tasks_completed: self.runs_completed.load(Ordering::Relaxed),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::DeviceLoad;
    use crate::domain::subtask::TaskType;
    use crate::infrastructure::device_metrics::StaticDeviceMetrics;
    use crate::infrastructure::simulated::SimulatedExecutor;

    fn worker(id: &str, complexity: u8) -> Arc<WorkerAgent> {
        Arc::new(WorkerAgent::new(
            id,
            AgentCapability::new(complexity, 5, 5, 5),
            Arc::new(SimulatedExecutor::new()),
        ))
    }

    fn queen(workers: Vec<Arc<WorkerAgent>>) -> Arc<QueenAgent> {
        let monitor = Arc::new(PerformanceMonitor::new(Arc::new(StaticDeviceMetrics::new(
            DeviceLoad::new(10.0, 10.0, 30.0),
        ))));
        let services = SwarmServices {
            decomposer: TaskDecomposer::new(),
            scheduler: Arc::new(SwarmScheduler::new(Arc::clone(&monitor))),
            guard: Arc::new(GuardAgent::default()),
            monitor,
            params: Arc::new(AdaptiveParamsManager::new()),
            event_bus: EventBus::new(64),
        };
        let settings = QueenSettings {
            backoff: BackoffPolicy::new(1, 1.5, 5),
            ..Default::default()
        };
        Arc::new(QueenAgent::new("queen", services, workers, settings))
    }

    #[test]
    fn selection_respects_complexity_and_usage() {
        let weak = worker("weak", 3);
        let strong = worker("strong", 9);
        let pool = vec![Arc::clone(&weak), Arc::clone(&strong)];

        let hard = SubTask::new("hard", TaskType::Analyze, "hard").with_complexity(7);
        let lease = QueenAgent::select_worker(&hard, &pool).unwrap();
        assert_eq!(lease.worker_id(), "strong");
        assert!(QueenAgent::select_worker(&hard, &pool).is_none());
        drop(lease);

        let too_hard = SubTask::new("x", TaskType::Analyze, "x").with_complexity(10);
        assert!(QueenAgent::select_worker(&too_hard, &pool).is_none());
    }

    #[test]
    fn sequential_plan_uses_strongest_worker() {
        let q = queen(vec![worker("a", 5), worker("b", 9), worker("c", 7)]);
        let tasks = TaskDecomposer::new().decompose("登录", &ContextMap::new());
        let plan = q.sequential_plan(tasks);
        assert_eq!(plan.stages.len(), 5);
        assert!(plan.stages.iter().all(|s| s.tasks.len() == 1));
        assert_eq!(plan.workers.len(), 1);
        assert_eq!(plan.workers[0].id(), "b");
    }

    #[tokio::test]
    async fn blank_description_fails_decomposition() {
        let q = queen(vec![worker("w", 5)]);
        let result = q.execute_swarm_task("  ", &ContextMap::new()).await;
        assert!(!result.success);
        assert_eq!(result.total_tasks, 0);
        assert!(result.error.unwrap().starts_with("decomposition failed"));
    }

    #[tokio::test]
    async fn empty_pool_reports_no_worker() {
        let q = queen(Vec::new());
        let result = q.execute_swarm_task("wait a moment", &ContextMap::new()).await;
        assert!(!result.success);
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].error.as_deref(), Some("no worker available"));
        assert_eq!(result.results[0].executed_by, "none");
    }

    #[tokio::test]
    async fn cancelled_run_dispatches_nothing() {
        let q = queen(vec![worker("w", 9)]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = q
            .execute("登录", &ContextMap::new(), DispatchMode::Swarm, cancel)
            .await;
        assert!(!result.success);
        assert!(result.results.is_empty());
        assert_eq!(result.error.as_deref(), Some("cancelled"));
        assert_eq!(q.status().tasks_completed, 1);
    }
}
