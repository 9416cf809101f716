// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use droidswarm_core::application::decomposer::TaskDecomposer;
use droidswarm_core::application::guard::GuardAgent;
use droidswarm_core::application::queen::{QueenAgent, QueenSettings, SwarmServices};
use droidswarm_core::application::retry_strategy::{RetryError, SmartRetryStrategy};
use droidswarm_core::application::scheduler::SwarmScheduler;
use droidswarm_core::application::swarm_manager::SwarmManager;
use droidswarm_core::application::worker::WorkerAgent;
use droidswarm_core::domain::agent::AgentCapability;
use droidswarm_core::domain::capability::{ActionResult, CapabilityError, Executor};
use droidswarm_core::domain::context::ContextMap;
use droidswarm_core::domain::execution::{ExecutionStage, RunId};
use droidswarm_core::domain::gate::RiskLevel;
use droidswarm_core::domain::metrics::DeviceLoad;
use droidswarm_core::domain::retry::BackoffPolicy;
use droidswarm_core::domain::subtask::{SubTask, TaskType};
use droidswarm_core::domain::swarm_config::SwarmConfigSpec;
use droidswarm_core::infrastructure::adaptive_params::AdaptiveParamsManager;
use droidswarm_core::infrastructure::device_metrics::StaticDeviceMetrics;
use droidswarm_core::infrastructure::event_bus::EventBus;
use droidswarm_core::infrastructure::performance_monitor::PerformanceMonitor;
use droidswarm_core::infrastructure::simulated::{SimulatedExecutor, SimulatedVision};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Executor whose clicks never return in time.
struct StalledExecutor {
    clicks: AtomicU32,
}

#[async_trait]
impl Executor for StalledExecutor {
    async fn click(&self, _target: &str) -> Result<ActionResult, CapabilityError> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ActionResult::ok("late"))
    }

    async fn input(&self, _target: &str, _text: &str) -> Result<ActionResult, CapabilityError> {
        Ok(ActionResult::ok("typed"))
    }

    async fn scroll(&self, _direction: &str, _distance: i64) -> Result<ActionResult, CapabilityError> {
        Ok(ActionResult::ok("scrolled"))
    }

    async fn verify_condition(&self, _condition: &str) -> Result<bool, CapabilityError> {
        Ok(true)
    }

    async fn analyze_screen(&self) -> Result<String, CapabilityError> {
        Ok(String::new())
    }
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy::new(1, 1.5, 5)
}

fn queen_with(executor: Arc<dyn Executor>) -> (Arc<QueenAgent>, Arc<PerformanceMonitor>) {
    queen_with_pool(executor, 1)
}

fn queen_with_pool(executor: Arc<dyn Executor>, size: usize) -> (Arc<QueenAgent>, Arc<PerformanceMonitor>) {
    let monitor = Arc::new(PerformanceMonitor::new(Arc::new(StaticDeviceMetrics::new(
        DeviceLoad::new(10.0, 10.0, 30.0),
    ))));
    let services = SwarmServices {
        decomposer: TaskDecomposer::new(),
        scheduler: Arc::new(SwarmScheduler::new(Arc::clone(&monitor))),
        guard: Arc::new(GuardAgent::default()),
        monitor: Arc::clone(&monitor),
        params: Arc::new(AdaptiveParamsManager::new()),
        event_bus: EventBus::new(64),
    };
    let workers = (1..=size)
        .map(|i| {
            Arc::new(WorkerAgent::new(
                format!("worker-{i}"),
                AgentCapability::new(10, 6, 9, 9),
                Arc::clone(&executor),
            ))
        })
        .collect();
    let settings = QueenSettings {
        backoff: fast_backoff(),
        ..Default::default()
    };
    (Arc::new(QueenAgent::new("queen", services, workers, settings)), monitor)
}

#[tokio::test]
async fn test_each_attempt_is_bounded_by_task_timeout() {
    let exec = Arc::new(StalledExecutor {
        clicks: AtomicU32::new(0),
    });
    let (queen, monitor) = queen_with(exec.clone());
    let task = SubTask::new("tap", TaskType::Click, "tap ok")
        .with_data("target", "ok_button")
        .with_timeout_ms(20)
        .with_retry_count(2);

    let result = queen
        .execute_subtask(
            RunId::new(),
            &task,
            queen.workers(),
            &ContextMap::new(),
            &CancellationToken::new(),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.executed_by, "worker-1");
    assert_eq!(result.error.as_deref(), Some("subtask timed out after 20 ms"));
    assert_eq!(exec.clicks.load(Ordering::SeqCst), 2);
    // the lease was released when the timed-out attempt was dropped
    assert!(!queen.workers()[0].is_busy());
    assert_eq!(monitor.get_metrics().total_failures, 1);
}

#[tokio::test]
async fn test_stage_runs_concurrently_and_timeouts_stay_local() {
    let (queen, _monitor) = queen_with_pool(Arc::new(SimulatedExecutor::new()), 3);
    let stage = ExecutionStage::new(vec![
        SubTask::new("a", TaskType::Wait, "wait a").with_data("duration", 300i64),
        SubTask::new("b", TaskType::Wait, "wait b").with_data("duration", 300i64),
        SubTask::new("slow", TaskType::Wait, "wait too long")
            .with_data("duration", 5_000i64)
            .with_timeout_ms(100)
            .with_retry_count(1),
    ]);

    let started = Instant::now();
    let results = queen
        .execute_stage(
            RunId::new(),
            &stage,
            queen.workers(),
            &Arc::new(ContextMap::new()),
            &CancellationToken::new(),
        )
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(550), "stage took {elapsed:?}");
    let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "slow"]);
    assert!(results[0].success);
    assert!(results[1].success);
    assert!(!results[2].success);
    assert_eq!(results[2].error.as_deref(), Some("subtask timed out after 100 ms"));
    assert!(queen.workers().iter().all(|w| !w.is_busy()));
}

#[tokio::test]
async fn test_retry_sequence_records_one_sample() {
    let params = Arc::new(AdaptiveParamsManager::new());
    let retry = SmartRetryStrategy::new(Arc::clone(&params), fast_backoff());

    // unseen type: success rate 1.0, so one attempt
    let calls = AtomicU32::new(0);
    let outcome: Result<(), RetryError> = retry
        .execute_with_retry("swipe", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("flaky") }
        })
        .await;
    assert!(matches!(outcome, Err(RetryError::Exhausted { attempts: 1, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(params.stats("swipe").total_count, 1);

    // success rate now 0.0, so five attempts; the third one succeeds
    let outcome = retry
        .execute_with_retry("swipe", |attempt| async move {
            if attempt < 2 {
                Err(format!("miss #{attempt}"))
            } else {
                Ok(attempt)
            }
        })
        .await;
    assert_eq!(outcome.unwrap(), 2);
    let stats = params.stats("swipe");
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.success_count, 1);
}

#[tokio::test]
async fn test_retry_respects_cancellation_during_backoff() {
    let params = Arc::new(AdaptiveParamsManager::new());
    params.record("slow", false, Duration::from_millis(1));
    let retry = SmartRetryStrategy::new(Arc::clone(&params), BackoffPolicy::new(10_000, 2.0, 30_000));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome: Result<(), RetryError> = tokio::time::timeout(
        Duration::from_secs(2),
        retry.execute_with_cancellation("slow", &cancel, |_| async { Err::<(), _>("nope") }),
    )
    .await
    .expect("cancellation interrupts the backoff wait");
    assert!(matches!(outcome, Err(RetryError::Cancelled)));
}

#[test]
fn test_guard_flags_click_without_target() {
    let guard = GuardAgent::default();
    let task = SubTask::new("c", TaskType::Click, "tap");
    let check = guard.check_before_execution(&task, &ContextMap::new());
    assert!(!check.passed);
    assert_eq!(check.risk, RiskLevel::High);
    assert!(check.issues.iter().any(|i| i.contains("target")));

    let mut ctx = ContextMap::new();
    ctx.insert("target".into(), "ok_button".into());
    let check = guard.check_before_execution(&task, &ctx);
    assert!(check.passed);
    assert_eq!(check.risk, RiskLevel::Low);
}

#[tokio::test]
async fn test_enforced_gate_rejects_before_dispatch() {
    let mut config = SwarmConfigSpec::default();
    config.retry = fast_backoff();
    config.execution.enforce_gate = true;
    let exec = Arc::new(SimulatedExecutor::new());
    let swarm = SwarmManager::new(
        &config,
        exec,
        Arc::new(SimulatedVision::default()),
        Arc::new(StaticDeviceMetrics::new(DeviceLoad::new(10.0, 10.0, 30.0))),
    );

    let result = swarm.execute_task("click ok", &ContextMap::new(), true).await;

    assert!(!result.success);
    assert_eq!(result.results.len(), 1);
    let only = &result.results[0];
    assert_eq!(only.task_id, "task_1");
    assert_eq!(only.attempts, 0);
    assert_eq!(only.executed_by, "none");
    assert!(only.error.as_deref().unwrap().starts_with("gate check failed"));
    assert!(swarm.get_agent_status().workers.iter().all(|w| w.tasks_completed == 0));
}
