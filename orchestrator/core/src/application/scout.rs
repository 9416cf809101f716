// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scout Agent
//!
//! Reads the current screen through the Vision capability so the host can
//! feed what is visible into the next task's context. Each capture + OCR
//! pass is one attempt under [`SmartRetryStrategy`]; attempt `a` keeps only
//! text blocks at or above the adaptive `ocr` confidence threshold for `a`,
//! and an attempt that keeps nothing fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::application::retry_strategy::{RetryError, SmartRetryStrategy};
use crate::domain::agent::{Agent, AgentCapability, AgentRole, AgentStatus};
use crate::domain::capability::{CapabilityError, TextBlock, Vision};
use crate::domain::error::SwarmError;
use crate::domain::subtask::{SubTask, TaskType};

pub const EXPLORATION_TASK_TYPE: &str = "screen_exploration";
pub const OCR_TASK_TYPE: &str = "ocr";

const SCOUT_CAPABILITY: AgentCapability = AgentCapability::new(6, 9, 8, 8);

/// What the scout saw on one successful pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenEnvironment {
    /// Accepted blocks joined by newlines.
    pub text: String,
    pub elements: Vec<TextBlock>,
    pub confidence_threshold: f64,
    pub captured_at: DateTime<Utc>,
}

impl ScreenEnvironment {
    pub fn find(&self, needle: &str) -> Option<&TextBlock> {
        self.elements.iter().find(|b| b.text.contains(needle))
    }
}

pub struct ScoutAgent {
    id: String,
    vision: Arc<dyn Vision>,
    retry: Arc<SmartRetryStrategy>,
    busy: AtomicBool,
    explorations: AtomicU64,
}

impl ScoutAgent {
    pub fn new(id: impl Into<String>, vision: Arc<dyn Vision>, retry: Arc<SmartRetryStrategy>) -> Self {
        Self {
            id: id.into(),
            vision,
            retry,
            busy: AtomicBool::new(false),
            explorations: AtomicU64::new(0),
        }
    }

    pub async fn explore_screen(&self) -> Result<ScreenEnvironment, SwarmError> {
        self.busy.store(true, Ordering::Release);
        let vision = &self.vision;
        let params = self.retry.params();

        let outcome = self
            .retry
            .execute_with_retry(EXPLORATION_TASK_TYPE, move |attempt| async move {
                let started = Instant::now();
                let image = vision.capture_screen().await?;
                let ocr = vision.perform_ocr(&image).await?;
                let threshold = params.get_confidence_threshold(OCR_TASK_TYPE, attempt);

                let elements: Vec<TextBlock> = ocr
                    .blocks
                    .into_iter()
                    .filter(|b| b.confidence >= threshold)
                    .collect();
                params.record(OCR_TASK_TYPE, !elements.is_empty(), started.elapsed());
                debug!(attempt, threshold, kept = elements.len(), "OCR pass finished");

                if elements.is_empty() {
                    return Err(CapabilityError::Failed(format!(
                        "no text blocks at confidence >= {threshold:.2}"
                    )));
                }

                let text = elements
                    .iter()
                    .map(|b| b.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok::<_, CapabilityError>(ScreenEnvironment {
                    text,
                    elements,
                    confidence_threshold: threshold,
                    captured_at: image.captured_at,
                })
            })
            .await;

        self.busy.store(false, Ordering::Release);
        self.explorations.fetch_add(1, Ordering::Relaxed);

        match outcome {
            Ok(env) => {
                info!(elements = env.elements.len(), "Screen explored");
                Ok(env)
            }
            Err(RetryError::Cancelled) => Err(SwarmError::Cancelled),
            Err(e) => Err(SwarmError::ExecutionError(format!("screen exploration failed: {e}"))),
        }
    }
}

impl Agent for ScoutAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Scout
    }

    fn capability(&self) -> AgentCapability {
        SCOUT_CAPABILITY
    }

    /// Scouts only read the screen.
    fn can_handle(&self, task: &SubTask) -> bool {
        task.task_type == TaskType::Analyze && task.complexity <= SCOUT_CAPABILITY.complexity
    }

    fn status(&self) -> AgentStatus {
        AgentStatus {
            id: self.id.clone(),
            role: AgentRole::Scout,
            capability: SCOUT_CAPABILITY,
            busy: self.busy.load(Ordering::Acquire),
            tasks_completed: self.explorations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::{Bounds, OcrResult, ScreenImage};
    use crate::domain::retry::BackoffPolicy;
    use crate::infrastructure::adaptive_params::AdaptiveParamsManager;
    use crate::infrastructure::simulated::SimulatedVision;
    use async_trait::async_trait;
    use std::time::Duration;

    fn block(text: &str, confidence: f64) -> TextBlock {
        TextBlock {
            text: text.to_string(),
            confidence,
            bounds: Bounds { x: 0, y: 0, width: 10, height: 10 },
        }
    }

    fn strategy(params: Arc<AdaptiveParamsManager>) -> Arc<SmartRetryStrategy> {
        Arc::new(SmartRetryStrategy::new(params, BackoffPolicy::new(1, 1.5, 5)))
    }

    #[tokio::test]
    async fn keeps_blocks_above_threshold() {
        let params = Arc::new(AdaptiveParamsManager::new());
        let scout = ScoutAgent::new(
            "scout",
            Arc::new(SimulatedVision::default()),
            strategy(Arc::clone(&params)),
        );

        let env = scout.explore_screen().await.unwrap();
        assert_eq!(env.text, "微信\n搜索");
        assert!((env.confidence_threshold - 0.85).abs() < 1e-9);
        assert!(env.find("设置").is_none());
        assert_eq!(params.stats(EXPLORATION_TASK_TYPE).success_count, 1);
        assert_eq!(scout.status().tasks_completed, 1);
    }

    #[tokio::test]
    async fn later_attempts_lower_the_threshold() {
        let params = Arc::new(AdaptiveParamsManager::new());
        // drive the exploration success rate down so five attempts are allowed
        for _ in 0..4 {
            params.record(EXPLORATION_TASK_TYPE, false, Duration::from_millis(5));
        }
        let vision = SimulatedVision::new(vec![block("blurry", 0.76)]);
        let scout = ScoutAgent::new("scout", Arc::new(vision), strategy(Arc::clone(&params)));

        let env = scout.explore_screen().await.unwrap();
        assert_eq!(env.elements.len(), 1);
        // the first miss drops the ocr success rate to 0, so attempt 1 uses 0.65 - 0.05
        assert!((env.confidence_threshold - 0.60).abs() < 1e-9);
        assert_eq!(params.stats(OCR_TASK_TYPE).total_count, 2);
    }

    struct BrokenVision;

    #[async_trait]
    impl Vision for BrokenVision {
        async fn capture_screen(&self) -> Result<ScreenImage, CapabilityError> {
            Err(CapabilityError::Unavailable("screen capture permission denied".into()))
        }

        async fn perform_ocr(&self, _image: &ScreenImage) -> Result<OcrResult, CapabilityError> {
            unreachable!("capture always fails")
        }
    }

    #[tokio::test]
    async fn capture_failure_becomes_execution_error() {
        let scout = ScoutAgent::new(
            "scout",
            Arc::new(BrokenVision),
            strategy(Arc::new(AdaptiveParamsManager::new())),
        );
        let err = scout.explore_screen().await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(!scout.status().busy);
    }
}
