// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Roles
//!
//! The swarm has four roles: a coordinating **queen**, executing **workers**,
//! an environment-exploring **scout** and a validating **guard**. Each role is
//! its own type; they share the [`Agent`] interface so the composition root can
//! report on all of them uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::subtask::SubTask;

/// Ratings (1-10) describing what an agent can take on. Fixed for the
/// agent's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub complexity: u8,
    pub speed: u8,
    pub accuracy: u8,
    pub reliability: u8,
}

impl AgentCapability {
    pub const fn new(complexity: u8, speed: u8, accuracy: u8, reliability: u8) -> Self {
        Self {
            complexity,
            speed,
            accuracy,
            reliability,
        }
    }

    /// Sum of all four ratings; used to pick the strongest worker.
    pub fn score(&self) -> u32 {
        self.complexity as u32 + self.speed as u32 + self.accuracy as u32 + self.reliability as u32
    }

    pub fn ratings(&self) -> [(&'static str, u8); 4] {
        [
            ("complexity", self.complexity),
            ("speed", self.speed),
            ("accuracy", self.accuracy),
            ("reliability", self.reliability),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Queen,
    Worker,
    Scout,
    Guard,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentRole::Queen => "queen",
            AgentRole::Worker => "worker",
            AgentRole::Scout => "scout",
            AgentRole::Guard => "guard",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of one agent, as reported by `get_agent_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub id: String,
    pub role: AgentRole,
    pub capability: AgentCapability,
    pub busy: bool,
    pub tasks_completed: u64,
}

pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn role(&self) -> AgentRole;

    fn capability(&self) -> AgentCapability;

    fn can_handle(&self, task: &SubTask) -> bool {
        task.complexity <= self.capability().complexity
    }

    fn status(&self) -> AgentStatus {
        AgentStatus {
            id: self.id().to_string(),
            role: self.role(),
            capability: self.capability(),
            busy: false,
            tasks_completed: 0,
        }
    }
}
