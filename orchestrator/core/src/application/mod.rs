// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod decomposer;
pub mod guard;
pub mod queen;
pub mod retry_strategy;
pub mod scheduler;
pub mod scout;
pub mod swarm_manager;
pub mod worker;

// Re-export the agents and services for convenience
pub use decomposer::TaskDecomposer;
pub use guard::GuardAgent;
pub use queen::{DispatchMode, QueenAgent, QueenSettings, SwarmServices};
pub use retry_strategy::{RetryError, SmartRetryStrategy};
pub use scheduler::{ExecutionPlan, SwarmScheduler};
pub use scout::{ScoutAgent, ScreenEnvironment};
pub use swarm_manager::{SwarmManager, SwarmStatus};
pub use worker::{WorkerAgent, WorkerLease};
