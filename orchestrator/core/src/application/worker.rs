// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Worker Agent
//!
//! Executes one subtask at a time against the device [`Executor`].
//!
//! A worker is claimed through [`WorkerAgent::try_claim`], an atomic
//! compare-and-swap on its busy flag. The returned [`WorkerLease`] clears the
//! flag on drop, so the worker is released on every exit path including a
//! timed-out attempt whose future is dropped mid-flight.
//!
//! | Type | Capability calls | Data keys |
//! |------|------------------|-----------|
//! | CLICK | `click(target)` | `target` |
//! | INPUT | `click(target)` then `input(target, text)` | `target`, `text` |
//! | SCROLL | `scroll(direction, distance)` | `direction` (down), `distance` (500) |
//! | WAIT | sleep | `duration` ms (1000) |
//! | VERIFY | `verify_condition(condition)` | `condition` |
//! | ANALYZE | `analyze_screen()` | |
//! | COMPOSITE | each step in order, stops at the first failure | `steps`: list of maps with a `type` key |

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::agent::{Agent, AgentCapability, AgentRole, AgentStatus};
use crate::domain::capability::{ActionResult, Executor};
use crate::domain::context::{ContextError, ContextExt, ContextMap};
use crate::domain::error::SwarmError;
use crate::domain::subtask::{SubTask, TaskType};

pub const DEFAULT_SCROLL_DIRECTION: &str = "down";
pub const DEFAULT_SCROLL_DISTANCE: i64 = 500;
pub const DEFAULT_WAIT_MS: i64 = 1_000;

pub struct WorkerAgent {
    id: String,
    capability: AgentCapability,
    executor: Arc<dyn Executor>,
    busy: AtomicBool,
    tasks_completed: AtomicU64,
}

impl fmt::Debug for WorkerAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerAgent")
            .field("id", &self.id)
            .field("capability", &self.capability)
            .field("busy", &self.is_busy())
            .field("tasks_completed", &self.tasks_completed())
            .finish()
    }
}

impl WorkerAgent {
    pub fn new(id: impl Into<String>, capability: AgentCapability, executor: Arc<dyn Executor>) -> Self {
        Self {
            id: id.into(),
            capability,
            executor,
            busy: AtomicBool::new(false),
            tasks_completed: AtomicU64::new(0),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Executions finished by this worker, successful or not.
    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    /// Claim the worker exclusively. `None` if it is already busy.
    pub fn try_claim(self: &Arc<Self>) -> Option<WorkerLease> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| WorkerLease {
                worker: Arc::clone(self),
            })
    }

    /// Claim, execute and release. Fails with `NoWorkerAvailable` if the
    /// worker is already busy.
    pub async fn execute(self: &Arc<Self>, task: &SubTask) -> Result<ActionResult, SwarmError> {
        let lease = self.try_claim().ok_or(SwarmError::NoWorkerAvailable)?;
        lease.execute(task).await
    }

    async fn run(&self, task: &SubTask) -> Result<ActionResult, SwarmError> {
        debug!(worker = %self.id, task_id = %task.id, task_type = %task.task_type, "Executing subtask");
        let result = self.dispatch(task.task_type, &task.data).await;
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn dispatch<'a>(
        &'a self,
        task_type: TaskType,
        data: &'a ContextMap,
    ) -> BoxFuture<'a, Result<ActionResult, SwarmError>> {
        async move {
            match task_type {
                TaskType::Click => {
                    let target = data.get_str("target")?;
                    Ok(self.executor.click(target).await?)
                }
                TaskType::Input => {
                    let target = data.get_str("target")?;
                    let text = data.get_str("text")?;
                    let focused = self.executor.click(target).await?;
                    if !focused.success {
                        return Ok(focused);
                    }
                    Ok(self.executor.input(target, text).await?)
                }
                TaskType::Scroll => {
                    let direction = data.str_or("direction", DEFAULT_SCROLL_DIRECTION)?;
                    let distance = match data.get_int("distance") {
                        Ok(d) => d,
                        Err(ContextError::Missing(_)) => DEFAULT_SCROLL_DISTANCE,
                        Err(e) => return Err(e.into()),
                    };
                    Ok(self.executor.scroll(direction, distance).await?)
                }
                TaskType::Wait => {
                    let millis = match data.get_int("duration") {
                        Ok(d) => d.max(0),
                        Err(ContextError::Missing(_)) => DEFAULT_WAIT_MS,
                        Err(e) => return Err(e.into()),
                    };
                    tokio::time::sleep(Duration::from_millis(millis as u64)).await;
                    Ok(ActionResult::ok(format!("waited {millis} ms")))
                }
                TaskType::Verify => {
                    let condition = data.get_str("condition")?;
                    if self.executor.verify_condition(condition).await? {
                        Ok(ActionResult::ok(format!("condition met: {condition}")))
                    } else {
                        Ok(ActionResult::failed(format!("condition not met: {condition}")))
                    }
                }
                TaskType::Analyze => {
                    let analysis = self.executor.analyze_screen().await?;
                    Ok(ActionResult::ok("screen analyzed").with_output(analysis))
                }
                TaskType::Composite => self.run_steps(data).await,
            }
        }
        .boxed()
    }

    async fn run_steps(&self, data: &ContextMap) -> Result<ActionResult, SwarmError> {
        let steps = data.get_list("steps")?;
        for (index, step) in steps.iter().enumerate() {
            let step_data = step.as_map().ok_or_else(|| {
                SwarmError::ExecutionError(format!("composite step {index} is not a map"))
            })?;
            let step_type = step_data
                .get_str("type")?
                .parse::<TaskType>()
                .map_err(SwarmError::ExecutionError)?;

            let result = self.dispatch(step_type, step_data).await?;
            if !result.success {
                debug!(worker = %self.id, step = index, "Composite step failed");
                return Ok(result);
            }
        }
        Ok(ActionResult::ok(format!("completed {} steps", steps.len())))
    }
}

impl Agent for WorkerAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Worker
    }

    fn capability(&self) -> AgentCapability {
        self.capability
    }

    fn status(&self) -> AgentStatus {
        AgentStatus {
            id: self.id.clone(),
            role: AgentRole::Worker,
            capability: self.capability,
            busy: self.is_busy(),
            tasks_completed: self.tasks_completed(),
        }
    }
}

/// Exclusive hold on a worker. Releases the worker when dropped.
pub struct WorkerLease {
    worker: Arc<WorkerAgent>,
}

impl WorkerLease {
    pub fn worker(&self) -> &Arc<WorkerAgent> {
        &self.worker
    }

    pub fn worker_id(&self) -> &str {
        &self.worker.id
    }

    pub async fn execute(&self, task: &SubTask) -> Result<ActionResult, SwarmError> {
        self.worker.run(task).await
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.worker.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::CapabilityError;
    use crate::domain::context::ContextValue;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<String>>,
        fail_target: Option<String>,
    }

    impl RecordingExecutor {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn click(&self, target: &str) -> Result<ActionResult, CapabilityError> {
            self.push(format!("click:{target}"));
            if self.fail_target.as_deref() == Some(target) {
                return Ok(ActionResult::failed("not found"));
            }
            Ok(ActionResult::ok("clicked"))
        }

        async fn input(&self, target: &str, text: &str) -> Result<ActionResult, CapabilityError> {
            self.push(format!("input:{target}:{text}"));
            Ok(ActionResult::ok("typed"))
        }

        async fn scroll(&self, direction: &str, distance: i64) -> Result<ActionResult, CapabilityError> {
            self.push(format!("scroll:{direction}:{distance}"));
            Ok(ActionResult::ok("scrolled"))
        }

        async fn verify_condition(&self, condition: &str) -> Result<bool, CapabilityError> {
            self.push(format!("verify:{condition}"));
            Ok(condition == "ready")
        }

        async fn analyze_screen(&self) -> Result<String, CapabilityError> {
            Err(CapabilityError::Unavailable("no screen".into()))
        }
    }

    fn worker(executor: Arc<RecordingExecutor>) -> Arc<WorkerAgent> {
        Arc::new(WorkerAgent::new("w1", AgentCapability::new(5, 5, 5, 5), executor))
    }

    #[tokio::test]
    async fn input_focuses_target_before_typing() {
        let exec = Arc::new(RecordingExecutor::default());
        let w = worker(Arc::clone(&exec));
        let task = SubTask::new("t", TaskType::Input, "type name")
            .with_data("target", "username_field")
            .with_data("text", "alice");

        let result = w.execute(&task).await.unwrap();
        assert!(result.success);
        assert_eq!(exec.calls(), vec!["click:username_field", "input:username_field:alice"]);
        assert_eq!(w.tasks_completed(), 1);
        assert!(!w.is_busy());
    }

    #[tokio::test]
    async fn scroll_uses_defaults() {
        let exec = Arc::new(RecordingExecutor::default());
        let w = worker(Arc::clone(&exec));
        w.execute(&SubTask::new("s", TaskType::Scroll, "scroll")).await.unwrap();
        assert_eq!(exec.calls(), vec!["scroll:down:500"]);
    }

    #[tokio::test]
    async fn missing_target_is_an_error() {
        let w = worker(Arc::new(RecordingExecutor::default()));
        let err = w.execute(&SubTask::new("c", TaskType::Click, "tap")).await.unwrap_err();
        assert!(err.to_string().contains("target"));
        assert!(!w.is_busy());
    }

    #[tokio::test]
    async fn capability_errors_propagate() {
        let w = worker(Arc::new(RecordingExecutor::default()));
        let err = w.execute(&SubTask::new("a", TaskType::Analyze, "look")).await.unwrap_err();
        assert!(matches!(err, SwarmError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn composite_stops_at_first_failed_step() {
        let exec = Arc::new(RecordingExecutor {
            fail_target: Some("missing".into()),
            ..Default::default()
        });
        let w = worker(Arc::clone(&exec));

        let step = |ty: &str, key: &str, value: &str| {
            let mut map = ContextMap::new();
            map.insert("type".into(), ty.into());
            map.insert(key.into(), value.into());
            ContextValue::Map(map)
        };
        let task = SubTask::new("combo", TaskType::Composite, "combo").with_data(
            "steps",
            vec![
                step("verify", "condition", "ready"),
                step("CLICK", "target", "missing"),
                step("CLICK", "target", "never"),
            ],
        );

        let result = w.execute(&task).await.unwrap();
        assert!(!result.success);
        assert_eq!(exec.calls(), vec!["verify:ready", "click:missing"]);
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_lease_drops() {
        let w = worker(Arc::new(RecordingExecutor::default()));
        let lease = w.try_claim().expect("idle worker");
        assert!(w.is_busy());
        assert!(w.try_claim().is_none());
        assert!(matches!(
            w.execute(&SubTask::new("x", TaskType::Wait, "wait")).await,
            Err(SwarmError::NoWorkerAvailable)
        ));
        drop(lease);
        assert!(!w.is_busy());
    }

    #[tokio::test]
    async fn dropped_execution_releases_worker() {
        let w = worker(Arc::new(RecordingExecutor::default()));
        let task = SubTask::new("slow", TaskType::Wait, "wait").with_data("duration", 5_000i64);
        let lease = w.try_claim().unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(10), lease.execute(&task)).await;
        assert!(outcome.is_err());
        drop(lease);
        assert!(!w.is_busy());
        assert_eq!(w.tasks_completed(), 0);
    }

    #[test]
    fn can_handle_compares_complexity() {
        let w = worker(Arc::new(RecordingExecutor::default()));
        assert!(w.can_handle(&SubTask::new("a", TaskType::Click, "a").with_complexity(5)));
        assert!(!w.can_handle(&SubTask::new("b", TaskType::Click, "b").with_complexity(6)));
    }
}
