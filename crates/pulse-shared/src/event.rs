//! Canonical provider event.
//!
//! Every inbound webhook, whatever its shape, ends up as one `Event`.
//! The kind-specific fields live in `EventDetail`, which also carries the
//! `type` discriminator on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source tag stamped on every normalized webhook event.
pub const WEBHOOK_SOURCE: &str = "dynatrace_webhook";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Resolved,
    Error,
}

impl Severity {
    /// Urgent events also go out on the critical-alert channel.
    pub fn is_urgent(self) -> bool {
        matches!(self, Severity::Critical | Severity::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Resolved => "RESOLVED",
            Severity::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event discriminator without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Problem,
    Metric,
    Deployment,
    Generic,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Problem => "problem",
            EventKind::Metric => "metric",
            EventKind::Deployment => "deployment",
            EventKind::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "problem" => Some(EventKind::Problem),
            "metric" => Some(EventKind::Metric),
            "deployment" => Some(EventKind::Deployment),
            "generic" => Some(EventKind::Generic),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impacted entities: providers send either a count or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AffectedEntities {
    Count(u64),
    List(Vec<Value>),
}

impl AffectedEntities {
    pub fn count(&self) -> u64 {
        match self {
            AffectedEntities::Count(n) => *n,
            AffectedEntities::List(items) => items.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventDetail {
    Problem {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default)]
        tags: Vec<Value>,
        #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
        start_time: Option<DateTime<Utc>>,
        #[serde(rename = "endTime", default)]
        end_time: Option<DateTime<Utc>>,
    },
    Metric {
        #[serde(rename = "metricName", default, skip_serializing_if = "Option::is_none")]
        metric_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity: Option<Value>,
    },
    Deployment {
        #[serde(rename = "deploymentName", default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity: Option<Value>,
    },
    Generic {
        #[serde(default)]
        data: Value,
    },
}

impl EventDetail {
    pub fn kind(&self) -> EventKind {
        match self {
            EventDetail::Problem { .. } => EventKind::Problem,
            EventDetail::Metric { .. } => EventKind::Metric,
            EventDetail::Deployment { .. } => EventKind::Deployment,
            EventDetail::Generic { .. } => EventKind::Generic,
        }
    }
}

/// Normalized event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "affectedEntities", default, skip_serializing_if = "Option::is_none")]
    pub affected_entities: Option<AffectedEntities>,
    pub source: String,
    #[serde(flatten)]
    pub detail: EventDetail,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.detail.kind()
    }

    pub fn is_urgent(&self) -> bool {
        self.severity.is_urgent()
    }

    /// Provider-typed events (everything but generic).
    pub fn is_provider_typed(&self) -> bool {
        self.kind() != EventKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem_event() -> Event {
        Event {
            id: "P1".to_string(),
            title: "X".to_string(),
            severity: Severity::Critical,
            status: "OPEN".to_string(),
            timestamp: Utc::now(),
            affected_entities: Some(AffectedEntities::List(vec![])),
            source: WEBHOOK_SOURCE.to_string(),
            detail: EventDetail::Problem {
                description: None,
                url: None,
                tags: vec![],
                start_time: None,
                end_time: None,
            },
        }
    }

    #[test]
    fn test_wire_shape_is_flat() {
        let v = serde_json::to_value(problem_event()).unwrap();
        assert_eq!(v["type"], "problem");
        assert_eq!(v["severity"], "CRITICAL");
        assert_eq!(v["id"], "P1");
        assert_eq!(v["source"], "dynatrace_webhook");
        assert!(v["endTime"].is_null());
    }

    #[test]
    fn test_urgency() {
        assert!(Severity::Critical.is_urgent());
        assert!(Severity::Error.is_urgent());
        assert!(!Severity::Warning.is_urgent());
        assert!(!Severity::Resolved.is_urgent());
        assert!(problem_event().is_urgent());
    }

    #[test]
    fn test_affected_entities_count() {
        assert_eq!(AffectedEntities::Count(4).count(), 4);
        let list = AffectedEntities::List(vec![Value::from("HOST-1"), Value::from("HOST-2")]);
        assert_eq!(list.count(), 2);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(EventKind::parse("Deployment"), Some(EventKind::Deployment));
        assert_eq!(EventKind::parse("nope"), None);
        assert_eq!(problem_event().kind(), EventKind::Problem);
    }
}
