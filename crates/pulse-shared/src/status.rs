//! Status taxonomy shared by items, components and the overall verdict.

use serde::{Deserialize, Serialize};

/// Status of an item or a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Warning,
    Critical,
    Unknown,
    NotFound,
    Down,
}

impl Status {
    /// Severity rank used by every rollup.
    ///
    /// critical (and down) > warning > unknown > healthy (and not_found).
    pub fn rank(self) -> u8 {
        match self {
            Status::Healthy | Status::NotFound => 0,
            Status::Unknown => 1,
            Status::Warning => 2,
            Status::Critical | Status::Down => 3,
        }
    }

    /// Component status for a list of item statuses. A down item makes its
    /// component critical; no items at all means we know nothing.
    pub fn rollup<I>(statuses: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        let worst = statuses.into_iter().max_by_key(|s| s.rank());
        match worst {
            None => Status::Unknown,
            Some(Status::Down) => Status::Critical,
            Some(Status::NotFound) => Status::Healthy,
            Some(s) => s,
        }
    }

    /// The more severe of two statuses (first one wins ties).
    pub fn worst(self, other: Status) -> Status {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Healthy => "healthy",
            Status::Warning => "warning",
            Status::Critical => "critical",
            Status::Unknown => "unknown",
            Status::NotFound => "not_found",
            Status::Down => "down",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Status::Healthy => "✅",
            Status::Warning => "⚠️",
            Status::Critical => "🚨",
            Status::Unknown => "❓",
            Status::NotFound => "❌",
            Status::Down => "🔻",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall verdict of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Warning,
    Critical,
    Degraded,
}

impl OverallHealth {
    /// Total-order scan: any critical, else any warning, else any unknown.
    pub fn from_statuses<I>(statuses: I) -> OverallHealth
    where
        I: IntoIterator<Item = Status>,
    {
        let mut saw_warning = false;
        let mut saw_unknown = false;
        for status in statuses {
            match status {
                Status::Critical | Status::Down => return OverallHealth::Critical,
                Status::Warning => saw_warning = true,
                Status::Unknown => saw_unknown = true,
                Status::Healthy | Status::NotFound => {}
            }
        }
        if saw_warning {
            OverallHealth::Warning
        } else if saw_unknown {
            OverallHealth::Degraded
        } else {
            OverallHealth::Healthy
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Warning => "warning",
            OverallHealth::Critical => "critical",
            OverallHealth::Degraded => "degraded",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            OverallHealth::Healthy => "✅",
            OverallHealth::Warning => "⚠️",
            OverallHealth::Critical => "🚨",
            OverallHealth::Degraded => "🔶",
        }
    }
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
