// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Device load sources.
//!
//! `ProcDeviceMetrics` reads Linux/Android procfs and sysfs. Every reading is
//! best effort: a missing or malformed file yields `None` and the monitor
//! falls back to its configured constant.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::metrics::{DeviceLoad, DeviceMetricsSource};

const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ProcDeviceMetrics {
    proc_root: PathBuf,
    thermal_zone: PathBuf,
    sample_interval: Duration,
}

impl ProcDeviceMetrics {
    pub fn new(thermal_zone: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            thermal_zone: thermal_zone.into(),
            sample_interval: CPU_SAMPLE_INTERVAL,
        }
    }

    /// Read procfs files from `proc_root` instead of `/proc`.
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    fn read_cpu_ticks(&self) -> Option<CpuTicks> {
        let stat = std::fs::read_to_string(self.proc_root.join("stat")).ok()?;
        parse_cpu_ticks(&stat)
    }
}

impl Default for ProcDeviceMetrics {
    fn default() -> Self {
        Self::new("/sys/class/thermal/thermal_zone0/temp")
    }
}

impl DeviceMetricsSource for ProcDeviceMetrics {
    fn cpu_usage(&self) -> Option<f64> {
        let first = self.read_cpu_ticks()?;
        std::thread::sleep(self.sample_interval);
        let second = self.read_cpu_ticks()?;
        cpu_percent_between(first, second)
    }

    fn memory_usage(&self) -> Option<f64> {
        let meminfo = std::fs::read_to_string(self.proc_root.join("meminfo")).ok()?;
        parse_memory_percent(&meminfo)
    }

    fn temperature(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.thermal_zone).ok()?;
        parse_thermal_millidegrees(&raw)
    }
}

/// Fixed readings. Used by tests and by hosts without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDeviceMetrics {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub temperature: Option<f64>,
}

impl StaticDeviceMetrics {
    pub fn new(load: DeviceLoad) -> Self {
        Self {
            cpu: Some(load.cpu_usage),
            memory: Some(load.memory_usage),
            temperature: Some(load.temperature),
        }
    }

    /// Every reading unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

impl DeviceMetricsSource for StaticDeviceMetrics {
    fn cpu_usage(&self) -> Option<f64> {
        self.cpu
    }

    fn memory_usage(&self) -> Option<f64> {
        self.memory
    }

    fn temperature(&self) -> Option<f64> {
        self.temperature
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTicks {
    idle: u64,
    total: u64,
}

/// Aggregate `cpu` line of /proc/stat. Idle includes iowait.
fn parse_cpu_ticks(stat: &str) -> Option<CpuTicks> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    if values.len() < 4 {
        return None;
    }
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total = values.iter().sum();
    Some(CpuTicks { idle, total })
}

fn cpu_percent_between(first: CpuTicks, second: CpuTicks) -> Option<f64> {
    let total = second.total.checked_sub(first.total)?;
    let idle = second.idle.checked_sub(first.idle)?;
    if total == 0 {
        return None;
    }
    Some(((total - idle.min(total)) as f64 / total as f64) * 100.0)
}

fn parse_memory_percent(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    Some((total.saturating_sub(available) as f64 / total as f64) * 100.0)
}

fn parse_thermal_millidegrees(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    Some(value / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpu_line_and_computes_delta() {
        let first = parse_cpu_ticks("cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 1 2 3 4\n").unwrap();
        let second = parse_cpu_ticks("cpu  200 0 200 1200 200 0 0 0 0 0\n").unwrap();
        assert_eq!(first, CpuTicks { idle: 800, total: 1000 });
        // 800 ticks elapsed, 600 idle -> 25% busy
        let pct = cpu_percent_between(first, second).unwrap();
        assert!((pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_delta_without_progress_is_unavailable() {
        let ticks = CpuTicks { idle: 10, total: 20 };
        assert_eq!(cpu_percent_between(ticks, ticks), None);
    }

    #[test]
    fn parses_meminfo() {
        let meminfo = "MemTotal:        8000000 kB\nMemFree:  1000 kB\nMemAvailable:    2000000 kB\n";
        let pct = parse_memory_percent(meminfo).unwrap();
        assert!((pct - 75.0).abs() < 1e-9);
        assert_eq!(parse_memory_percent("MemTotal: 10 kB\n"), None);
    }

    #[test]
    fn parses_thermal_zone() {
        assert_eq!(parse_thermal_millidegrees("42500\n"), Some(42.5));
        assert_eq!(parse_thermal_millidegrees("n/a"), None);
    }

    #[test]
    fn reads_from_alternate_proc_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("meminfo"), "MemTotal: 100 kB\nMemAvailable: 40 kB\n").unwrap();
        let thermal = dir.path().join("temp");
        std::fs::write(&thermal, "38000").unwrap();

        let source = ProcDeviceMetrics::new(&thermal)
            .with_proc_root(dir.path())
            .with_sample_interval(Duration::from_millis(1));

        assert_eq!(source.memory_usage(), Some(60.0));
        assert_eq!(source.temperature(), Some(38.0));
        assert_eq!(source.cpu_usage(), None);
    }
}
