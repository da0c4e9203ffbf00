//! Static metric thresholds and the evaluator that applies them.
//!
//! Comparison is strictly greater-than: a reading sitting exactly on a
//! threshold does not cross it.

use crate::error::{PulseError, PulseResult};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metric kinds with registered thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    Cpu,
    Memory,
    ResponseTime,
    ErrorRate,
    DiskUsage,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::ResponseTime,
        MetricKind::ErrorRate,
        MetricKind::DiskUsage,
    ];

    /// Human label used in issue strings.
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU usage",
            MetricKind::Memory => "memory usage",
            MetricKind::ResponseTime => "response time",
            MetricKind::ErrorRate => "error rate",
            MetricKind::DiskUsage => "disk usage",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::ResponseTime => "ms",
            _ => "%",
        }
    }
}

/// Warning and critical boundaries for one metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

impl Threshold {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }
}

/// Threshold table, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    thresholds: HashMap<MetricKind, Threshold>,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        let mut thresholds = HashMap::new();
        thresholds.insert(MetricKind::Cpu, Threshold::new(70.0, 85.0));
        thresholds.insert(MetricKind::Memory, Threshold::new(80.0, 90.0));
        thresholds.insert(MetricKind::ResponseTime, Threshold::new(1000.0, 3000.0));
        thresholds.insert(MetricKind::ErrorRate, Threshold::new(1.0, 5.0));
        thresholds.insert(MetricKind::DiskUsage, Threshold::new(80.0, 90.0));
        Self { thresholds }
    }
}

impl ThresholdSet {
    /// Empty table. Every lookup fails until kinds are registered.
    pub fn empty() -> Self {
        Self {
            thresholds: HashMap::new(),
        }
    }

    pub fn with(mut self, kind: MetricKind, threshold: Threshold) -> Self {
        self.thresholds.insert(kind, threshold);
        self
    }

    pub fn get(&self, kind: MetricKind) -> PulseResult<Threshold> {
        self.thresholds.get(&kind).copied().ok_or_else(|| {
            PulseError::Configuration(format!("no threshold registered for {:?}", kind))
        })
    }

    /// Map a reading to a status.
    pub fn classify(&self, kind: MetricKind, value: f64) -> PulseResult<Status> {
        let t = self.get(kind)?;
        Ok(if value > t.critical {
            Status::Critical
        } else if value > t.warning {
            Status::Warning
        } else {
            Status::Healthy
        })
    }

    /// Issue text for a reading, or `None` when it crosses nothing.
    pub fn issue_for(&self, kind: MetricKind, value: f64) -> PulseResult<Option<String>> {
        let status = self.classify(kind, value)?;
        let prefix = match status {
            Status::Critical => "Critical",
            Status::Warning => "High",
            _ => return Ok(None),
        };
        Ok(Some(format!(
            "{} {}: {}{}",
            prefix,
            kind.label(),
            format_reading(value),
            kind.unit()
        )))
    }
}

/// Readings are shown without a trailing ".0" when whole.
pub fn format_reading(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}
