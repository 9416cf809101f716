// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod adaptive_params;
pub mod device_metrics;
pub mod event_bus;
pub mod performance_monitor;
pub mod simulated;

pub use adaptive_params::AdaptiveParamsManager;
pub use device_metrics::{ProcDeviceMetrics, StaticDeviceMetrics};
pub use event_bus::{EventBus, EventBusError};
pub use performance_monitor::PerformanceMonitor;
pub use simulated::{SimulatedExecutor, SimulatedVision};
