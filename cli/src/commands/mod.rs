// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the DroidSwarm CLI

pub mod config;
pub mod status;
pub mod task;

pub use self::config::ConfigCommand;
pub use self::task::TaskCommand;
