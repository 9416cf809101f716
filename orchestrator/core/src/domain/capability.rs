// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Collaborators
//!
//! Narrow async contracts for the device-facing collaborators the swarm
//! drives. Concrete UI actuation and OCR live behind these traits; the
//! orchestration core never reaches past them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    #[error("Capability call failed: {0}")]
    Failed(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Response of one actuation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    /// Free-form payload, e.g. the analysis text of an ANALYZE step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// UI actuation used by worker agents.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn click(&self, target: &str) -> Result<ActionResult, CapabilityError>;
    async fn input(&self, target: &str, text: &str) -> Result<ActionResult, CapabilityError>;
    async fn scroll(&self, direction: &str, distance: i64) -> Result<ActionResult, CapabilityError>;
    async fn verify_condition(&self, condition: &str) -> Result<bool, CapabilityError>;
    async fn analyze_screen(&self) -> Result<String, CapabilityError>;
}

/// Opaque handle to a captured frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenImage {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// 0.0-1.0
    pub confidence: f64,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub blocks: Vec<TextBlock>,
}

/// Screen capture and recognition used by the scout agent.
#[async_trait]
pub trait Vision: Send + Sync {
    async fn capture_screen(&self) -> Result<ScreenImage, CapabilityError>;
    async fn perform_ocr(&self, image: &ScreenImage) -> Result<OcrResult, CapabilityError>;
}
