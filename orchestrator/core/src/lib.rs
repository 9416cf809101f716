// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! droidswarm core
//!
//! Adaptive swarm orchestration engine for an on-device mobile automation
//! agent: task decomposition, staged scheduling, concurrent dispatch with
//! adaptive retry, and aggregation.
//!
//! # Architecture
//!
//! - **domain:** value types, capability traits, configuration manifest
//! - **application:** agents (queen, worker, scout, guard), decomposer,
//!   scheduler, retry strategy, and the [`SwarmManager`] composition root
//! - **infrastructure:** performance monitor, adaptive statistics, device
//!   metrics sources, event bus, simulated capabilities

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::swarm_manager::{SwarmManager, SwarmStatus};
pub use domain::capability::{ActionResult, CapabilityError, Executor, Vision};
pub use domain::context::{ContextMap, ContextValue};
pub use domain::error::SwarmError;
pub use domain::execution::{SwarmExecutionResult, SwarmTaskResult};
pub use domain::subtask::{SubTask, TaskType};
pub use domain::swarm_config::SwarmConfigManifest;
