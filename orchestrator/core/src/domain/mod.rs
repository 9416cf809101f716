// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types shared by every layer and the capability contracts the engine
//! consumes from the device.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Subtasks, results, metrics snapshots, errors, events and
//!   the swarm configuration manifest

pub mod agent;
pub mod capability;
pub mod context;
pub mod error;
pub mod events;
pub mod execution;
pub mod gate;
pub mod metrics;
pub mod retry;
pub mod subtask;
pub mod swarm_config;
