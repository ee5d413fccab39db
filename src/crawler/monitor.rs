//! Resource pressure monitor
//!
//! After every completed attempt the scheduler reports its queue depth and
//! dispatch count here. A diagnostic line is emitted only when the queue has
//! drained to (almost) nothing or the pressure moved noticeably since the last
//! line, so a busy crawl does not flood the log.

use crate::config::MonitorConfig;
use std::fmt;
use sysinfo::{Pid, System};

/// Process memory at one instant, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub resident: u64,
    pub virtual_memory: u64,
}

/// Source of process memory readings
pub trait MemoryProbe {
    fn sample(&mut self) -> MemoryUsage;
}

/// Reads this process's memory through sysinfo
pub struct ProcessMemory {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn sample(&mut self) -> MemoryUsage {
        let Some(pid) = self.pid else {
            return MemoryUsage::default();
        };
        if !self.system.refresh_process(pid) {
            return MemoryUsage::default();
        }

        self.system
            .process(pid)
            .map(|process| MemoryUsage {
                resident: process.memory(),
                virtual_memory: process.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

/// One emitted diagnostic
///
/// There is no portable heap reading for a native process, so the line reports
/// the process's virtual memory size where a managed runtime would report heap
/// used and heap total. `virtual:` in the log line is that size, not a heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub stack_depth: usize,
    pub total_dispatched: u64,
    pub memory: MemoryUsage,
    /// Resident set change since the previous report (or construction)
    pub resident_delta: i64,
}

impl fmt::Display for ResourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(process) stack: {}, RAM: {} ({}) requests: {}, virtual: {}",
            self.stack_depth,
            format_mb(self.memory.resident as f64),
            format_signed_mb(self.resident_delta),
            self.total_dispatched,
            format_mb(self.memory.virtual_memory as f64),
        )
    }
}

/// Throttled memory/queue diagnostics
pub struct ResourceMonitor {
    probe: Box<dyn MemoryProbe>,
    config: MonitorConfig,
    last_resident: u64,
    last_pressure: u64,
    samples: u64,
    last_report: Option<ResourceReport>,
}

impl ResourceMonitor {
    /// Creates a monitor reading this process through sysinfo
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_probe(config, Box::new(ProcessMemory::new()))
    }

    /// Creates a monitor with a custom probe; the first reading becomes the baseline
    pub fn with_probe(config: MonitorConfig, mut probe: Box<dyn MemoryProbe>) -> Self {
        let last_resident = if config.enabled {
            probe.sample().resident
        } else {
            0
        };

        Self {
            probe,
            config,
            last_resident,
            last_pressure: 0,
            samples: 0,
            last_report: None,
        }
    }

    /// Returns true if a sample at this stack depth and pressure stays quiet
    pub fn is_suppressed(&self, stack_depth: usize, pressure: u64) -> bool {
        stack_depth != 0
            && (stack_depth <= self.config.quiet_stack
                || self.last_pressure.abs_diff(pressure) < self.config.pressure_delta)
    }

    /// Samples pressure and, unless suppressed, memory
    ///
    /// `pressure = stack_depth + total_dispatched`. Returns the report that was
    /// logged, or `None` when the sample was suppressed.
    pub fn sample(&mut self, stack_depth: usize, total_dispatched: u64) -> Option<ResourceReport> {
        self.samples += 1;
        if !self.config.enabled {
            return None;
        }

        let pressure = stack_depth as u64 + total_dispatched;
        if self.is_suppressed(stack_depth, pressure) {
            return None;
        }

        let memory = self.probe.sample();
        let report = ResourceReport {
            stack_depth,
            total_dispatched,
            memory,
            resident_delta: memory.resident as i64 - self.last_resident as i64,
        };
        tracing::debug!("{}", report);

        self.last_resident = memory.resident;
        self.last_pressure = pressure;
        self.last_report = Some(report.clone());
        Some(report)
    }

    pub fn last_pressure(&self) -> u64 {
        self.last_pressure
    }

    /// Number of `sample` calls, suppressed ones included
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// The most recent report that was emitted
    pub fn last_report(&self) -> Option<&ResourceReport> {
        self.last_report.as_ref()
    }
}

fn format_mb(bytes: f64) -> String {
    format!("{:.2}Mb", bytes / 1024.0 / 1024.0)
}

fn format_signed_mb(bytes: i64) -> String {
    let formatted = format_mb(bytes as f64);
    if formatted.starts_with('-') {
        formatted
    } else {
        format!("+{}", formatted)
    }
}
