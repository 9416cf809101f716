// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Swarm Configuration Types
//
// Defines the configuration manifest for a droidswarm host:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Worker pool and capability ratings
// - Scheduler policy (cycle handling, worker ceiling)
// - Retry backoff and execution gating
// - Device metrics fallbacks

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::domain::agent::AgentCapability;
use crate::domain::metrics::{FALLBACK_CPU_PERCENT, FALLBACK_MEMORY_PERCENT, FALLBACK_TEMPERATURE_C};
use crate::domain::retry::BackoffPolicy;

pub const API_VERSION: &str = "droidswarm/v1";
pub const KIND: &str = "SwarmConfig";
pub const CONFIG_PATH_ENV: &str = "DROIDSWARM_CONFIG_PATH";

/// Top-level Kubernetes-style swarm configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfigManifest {
    /// API version (must be "droidswarm/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SwarmConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: SwarmConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfigSpec {
    /// Worker pool, in preference order
    #[serde(default = "default_workers")]
    pub workers: Vec<WorkerConfig>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Backoff between retry attempts
    #[serde(default)]
    pub retry: BackoffPolicy,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub device_metrics: DeviceMetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub id: String,
    pub capability: AgentCapability,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// Run every unschedulable subtask together in one last stage.
    #[default]
    ForceFinalStage,
    /// Fail the run before dispatching anything.
    Reject,
}

impl std::str::FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "force-final-stage" => Ok(CyclePolicy::ForceFinalStage),
            "reject" => Ok(CyclePolicy::Reject),
            other => Err(format!("unknown cycle policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_cycle_policy")]
    pub cycle_policy: CyclePolicy,

    /// Ceiling on concurrently active workers when the device is idle
    #[serde(default = "default_max_active_workers")]
    pub max_active_workers: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Fail subtasks that do not pass the guard's pre-execution check
    #[serde(default)]
    pub enforce_gate: bool,

    /// Let rolling per-type statistics raise attempt counts and timeouts
    #[serde(default)]
    pub adaptive_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceMetricsConfig {
    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: PathBuf,

    #[serde(default = "default_fallback_cpu")]
    pub fallback_cpu_percent: f64,

    #[serde(default = "default_fallback_memory")]
    pub fallback_memory_percent: f64,

    #[serde(default = "default_fallback_temperature")]
    pub fallback_temperature_c: f64,
}

fn default_workers() -> Vec<WorkerConfig> {
    [
        ("worker-1", AgentCapability::new(10, 6, 9, 9)),
        ("worker-2", AgentCapability::new(8, 8, 8, 8)),
        ("worker-3", AgentCapability::new(8, 7, 8, 7)),
        ("worker-4", AgentCapability::new(6, 9, 7, 7)),
        ("worker-5", AgentCapability::new(5, 9, 7, 8)),
    ]
    .into_iter()
    .map(|(id, capability)| WorkerConfig {
        id: id.to_string(),
        capability,
    })
    .collect()
}

fn default_cycle_policy() -> CyclePolicy {
    CyclePolicy::ForceFinalStage
}

fn default_max_active_workers() -> usize {
    5
}

fn default_thermal_zone() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

fn default_fallback_cpu() -> f64 {
    FALLBACK_CPU_PERCENT
}

fn default_fallback_memory() -> f64 {
    FALLBACK_MEMORY_PERCENT
}

fn default_fallback_temperature() -> f64 {
    FALLBACK_TEMPERATURE_C
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_policy: default_cycle_policy(),
            max_active_workers: default_max_active_workers(),
        }
    }
}

impl Default for DeviceMetricsConfig {
    fn default() -> Self {
        Self {
            thermal_zone: default_thermal_zone(),
            fallback_cpu_percent: default_fallback_cpu(),
            fallback_memory_percent: default_fallback_memory(),
            fallback_temperature_c: default_fallback_temperature(),
        }
    }
}

impl Default for SwarmConfigSpec {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            scheduler: SchedulerConfig::default(),
            retry: BackoffPolicy::default(),
            execution: ExecutionConfig::default(),
            device_metrics: DeviceMetricsConfig::default(),
        }
    }
}

impl Default for SwarmConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "droidswarm".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: SwarmConfigSpec::default(),
        }
    }
}

impl SwarmConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate config locations, highest precedence first
    /// 1. DROIDSWARM_CONFIG_PATH environment variable
    /// 2. ./droidswarm-config.yaml (working directory)
    /// 3. ~/.droidswarm/config.yaml (user home)
    /// 4. /etc/droidswarm/config.yaml (system)
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./droidswarm-config.yaml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".droidswarm").join("config.yaml"));
        }
        paths.push(PathBuf::from("/etc/droidswarm/config.yaml"));
        paths
    }

    pub fn discover_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.exists())
    }

    /// Load from an explicit path (which must exist), else from discovery,
    /// else defaults. Environment overrides are applied in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DROIDSWARM_ENFORCE_GATE") {
            match parse_bool(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: DROIDSWARM_ENFORCE_GATE={}", enabled);
                    self.spec.execution.enforce_gate = enabled;
                }
                None => tracing::warn!(
                    "Invalid value for DROIDSWARM_ENFORCE_GATE: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("DROIDSWARM_CYCLE_POLICY") {
            match val.parse::<CyclePolicy>() {
                Ok(policy) => {
                    tracing::info!("Environment override: DROIDSWARM_CYCLE_POLICY={:?}", policy);
                    self.spec.scheduler.cycle_policy = policy;
                }
                Err(e) => tracing::warn!("Invalid DROIDSWARM_CYCLE_POLICY: {}. Ignoring.", e),
            }
        }

        if let Ok(val) = std::env::var("DROIDSWARM_MAX_WORKERS") {
            match val.parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: DROIDSWARM_MAX_WORKERS={}", n);
                    self.spec.scheduler.max_active_workers = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for DROIDSWARM_MAX_WORKERS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.workers.is_empty() {
            anyhow::bail!("spec.workers must declare at least one worker");
        }

        let mut seen = HashSet::new();
        for worker in &self.spec.workers {
            if worker.id.is_empty() {
                anyhow::bail!("worker id cannot be empty");
            }
            if !seen.insert(worker.id.as_str()) {
                anyhow::bail!("duplicate worker id '{}'", worker.id);
            }
            for (name, rating) in worker.capability.ratings() {
                if !(1..=10).contains(&rating) {
                    anyhow::bail!(
                        "worker '{}' has {} rating {} outside 1-10",
                        worker.id,
                        name,
                        rating
                    );
                }
            }
        }

        if self.spec.scheduler.max_active_workers == 0 {
            anyhow::bail!("scheduler.max_active_workers must be >= 1");
        }

        let retry = &self.spec.retry;
        if retry.multiplier < 1.0 {
            anyhow::bail!("retry.multiplier must be >= 1.0 (got {})", retry.multiplier);
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            anyhow::bail!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                retry.base_delay_ms,
                retry.max_delay_ms
            );
        }

        Ok(())
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
