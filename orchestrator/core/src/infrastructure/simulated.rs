// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process stand-ins for the device capabilities, so the engine can be
//! driven end to end without a phone attached (CLI dry runs, demos).

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::domain::capability::{
    ActionResult, Bounds, CapabilityError, Executor, OcrResult, ScreenImage, TextBlock, Vision,
};

/// Executor that logs each action and succeeds, except for targets listed
/// as failing.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    latency: Duration,
    failing_targets: HashSet<String>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every action.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failing_target(mut self, target: impl Into<String>) -> Self {
        self.failing_targets.insert(target.into());
        self
    }

    async fn act(&self, target: &str, message: String) -> Result<ActionResult, CapabilityError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing_targets.contains(target) {
            return Ok(ActionResult::failed(format!("element '{target}' not found")));
        }
        info!("[simulated] {}", message);
        Ok(ActionResult::ok(message))
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn click(&self, target: &str) -> Result<ActionResult, CapabilityError> {
        self.act(target, format!("clicked {target}")).await
    }

    async fn input(&self, target: &str, text: &str) -> Result<ActionResult, CapabilityError> {
        self.act(target, format!("typed {} chars into {target}", text.chars().count()))
            .await
    }

    async fn scroll(&self, direction: &str, distance: i64) -> Result<ActionResult, CapabilityError> {
        self.act(direction, format!("scrolled {direction} by {distance}")).await
    }

    async fn verify_condition(&self, condition: &str) -> Result<bool, CapabilityError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(!self.failing_targets.contains(condition))
    }

    async fn analyze_screen(&self) -> Result<String, CapabilityError> {
        Ok("simulated screen: home launcher, 12 icons, status bar visible".to_string())
    }
}

/// Vision that returns a fixed OCR result.
#[derive(Debug, Clone)]
pub struct SimulatedVision {
    blocks: Vec<TextBlock>,
}

impl SimulatedVision {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self { blocks }
    }
}

impl Default for SimulatedVision {
    fn default() -> Self {
        let block = |text: &str, confidence: f64, y: i32| TextBlock {
            text: text.to_string(),
            confidence,
            bounds: Bounds { x: 40, y, width: 400, height: 60 },
        };
        Self::new(vec![
            block("微信", 0.97, 120),
            block("搜索", 0.91, 220),
            block("设置", 0.72, 320),
        ])
    }
}

#[async_trait]
impl Vision for SimulatedVision {
    async fn capture_screen(&self) -> Result<ScreenImage, CapabilityError> {
        Ok(ScreenImage {
            id: Uuid::new_v4().to_string(),
            width: 1080,
            height: 2400,
            captured_at: Utc::now(),
        })
    }

    async fn perform_ocr(&self, _image: &ScreenImage) -> Result<OcrResult, CapabilityError> {
        let text = self
            .blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(OcrResult {
            text,
            blocks: self.blocks.clone(),
        })
    }
}
