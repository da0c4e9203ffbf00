//! Inbound provider webhooks.
//!
//! Payloads come in four shapes. `WebhookPayload::parse` picks the shape by
//! the first known top-level key, in fixed order; anything unrecognised, or
//! a known key whose body does not parse, is kept verbatim as generic.

use crate::broadcaster::Broadcaster;
use crate::event_store::EventStore;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use pulse_shared::event::{AffectedEntities, Event, EventDetail, Severity, WEBHOOK_SOURCE};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Provider-side header carrying the shared secret.
pub const TOKEN_HEADER: &str = "x-pulse-token";

pub const WEBHOOK_PATH: &str = "/api/webhooks/dynatrace";

static STARTED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"Started:\s*([^,\n]+)").ok());

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemNotification {
    #[serde(rename = "PID", default)]
    pub pid: Option<Value>,
    #[serde(rename = "problemId", default)]
    pub problem_id: Option<Value>,
    #[serde(rename = "ProblemTitle", default)]
    pub problem_title: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "ProblemDetailsText", default)]
    pub details: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "ProblemURL", default)]
    pub url: Option<String>,
    #[serde(rename = "ImpactedEntities", default)]
    pub impacted_entities: Option<Value>,
    #[serde(rename = "Tags", default)]
    pub tags: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEvent {
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub violation_state: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub threshold: Option<Value>,
    #[serde(default)]
    pub entity: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEvent {
    #[serde(default)]
    pub deployment_name: Option<String>,
    #[serde(default)]
    pub deployment_status: Option<String>,
    #[serde(default)]
    pub deployment_version: Option<String>,
    #[serde(default)]
    pub entity: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum WebhookPayload {
    Problem(ProblemNotification),
    Metric(MetricEvent),
    Deployment(DeploymentEvent),
    Generic(Value),
}

impl WebhookPayload {
    pub fn parse(raw: Value) -> Self {
        if let Some(body) = present(&raw, "ProblemNotification") {
            return match serde_json::from_value(body.clone()) {
                Ok(problem) => WebhookPayload::Problem(problem),
                Err(e) => {
                    debug!("[HOOK] ProblemNotification did not parse: {}", e);
                    WebhookPayload::Generic(raw)
                }
            };
        }
        if let Some(body) = present(&raw, "MetricEvent") {
            return match serde_json::from_value(body.clone()) {
                Ok(metric) => WebhookPayload::Metric(metric),
                Err(e) => {
                    debug!("[HOOK] MetricEvent did not parse: {}", e);
                    WebhookPayload::Generic(raw)
                }
            };
        }
        if let Some(body) = present(&raw, "DeploymentEvent") {
            return match serde_json::from_value(body.clone()) {
                Ok(deployment) => WebhookPayload::Deployment(deployment),
                Err(e) => {
                    debug!("[HOOK] DeploymentEvent did not parse: {}", e);
                    WebhookPayload::Generic(raw)
                }
            };
        }
        WebhookPayload::Generic(raw)
    }
}

/// A key counts only when its value is set (not null, false, 0 or "").
fn present<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn generated_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn affected_entities(value: Option<Value>) -> AffectedEntities {
    match value {
        Some(Value::Array(items)) => AffectedEntities::List(items),
        Some(Value::Number(n)) => AffectedEntities::Count(n.as_u64().unwrap_or(0)),
        Some(Value::Null) | None => AffectedEntities::List(Vec::new()),
        Some(other) => AffectedEntities::List(vec![other]),
    }
}

fn tags(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// Start time from a `Started: <time>` line of the problem text.
pub fn extract_start_time(text: &str) -> Option<DateTime<Utc>> {
    let captured = STARTED.as_ref()?.captures(text)?.get(1)?.as_str().trim();
    parse_timestamp(captured)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(raw) {
        return Some(t.with_timezone(&Utc));
    }
    let trimmed = raw.trim_end_matches(" UTC").trim_end_matches('Z');
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Map any inbound payload to a canonical event. Never fails.
pub fn normalize(raw: Value) -> Event {
    let now = Utc::now();
    match WebhookPayload::parse(raw) {
        WebhookPayload::Problem(p) => {
            let state = p.state.clone().unwrap_or_else(|| "UNKNOWN".to_string());
            let id = p
                .pid
                .as_ref()
                .and_then(id_text)
                .or_else(|| p.problem_id.as_ref().and_then(id_text))
                .unwrap_or_else(|| generated_id("problem"));
            let start_time = p
                .details
                .as_deref()
                .filter(|text| text.contains("Started:"))
                .and_then(extract_start_time);
            Event {
                id,
                title: p
                    .problem_title
                    .or(p.title)
                    .unwrap_or_else(|| "Unknown Problem".to_string()),
                severity: if state == "OPEN" {
                    Severity::Critical
                } else {
                    Severity::Resolved
                },
                affected_entities: Some(affected_entities(p.impacted_entities)),
                detail: EventDetail::Problem {
                    description: p.details.or(p.description),
                    url: p.url,
                    tags: tags(p.tags),
                    start_time,
                    end_time: (state == "RESOLVED").then_some(now),
                },
                status: state,
                timestamp: now,
                source: WEBHOOK_SOURCE.to_string(),
            }
        }
        WebhookPayload::Metric(m) => {
            let violated = m.violation_state.as_deref() == Some("VIOLATED");
            Event {
                id: generated_id("metric"),
                title: format!(
                    "Metric Alert: {}",
                    m.metric_name.as_deref().unwrap_or("Unknown Metric")
                ),
                severity: if violated {
                    Severity::Warning
                } else {
                    Severity::Info
                },
                status: m.violation_state.unwrap_or_else(|| "UNKNOWN".to_string()),
                timestamp: now,
                affected_entities: None,
                source: WEBHOOK_SOURCE.to_string(),
                detail: EventDetail::Metric {
                    metric_name: m.metric_name,
                    value: m.value,
                    threshold: m.threshold,
                    entity: m.entity,
                },
            }
        }
        WebhookPayload::Deployment(d) => Event {
            id: generated_id("deployment"),
            title: format!(
                "Deployment: {}",
                d.deployment_name.as_deref().unwrap_or("Unknown Deployment")
            ),
            severity: Severity::Info,
            status: d.deployment_status.unwrap_or_else(|| "UNKNOWN".to_string()),
            timestamp: now,
            affected_entities: None,
            source: WEBHOOK_SOURCE.to_string(),
            detail: EventDetail::Deployment {
                name: d.deployment_name,
                version: d.deployment_version,
                entity: d.entity,
            },
        },
        WebhookPayload::Generic(data) => Event {
            id: generated_id("event"),
            title: "Dynatrace Event".to_string(),
            severity: Severity::Info,
            status: "RECEIVED".to_string(),
            timestamp: now,
            affected_entities: None,
            source: WEBHOOK_SOURCE.to_string(),
            detail: EventDetail::Generic { data },
        },
    }
}

/// Normalize, store and fan out one webhook.
pub fn ingest(raw: Value, store: &EventStore, broadcaster: &Broadcaster) -> Event {
    let event = normalize(raw);
    info!(
        "[HOOK] {} event {} ({}): {}",
        event.kind().as_str(),
        event.id,
        event.severity.as_str(),
        event.title
    );
    store.store(event.clone());
    let delivered = broadcaster.publish(&event);
    if event.is_urgent() {
        warn!("[HOOK] Urgent event {} sent to {} clients", event.id, delivered);
    }
    event
}

/// Keep the first few characters of a secret for display.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Provider-side webhook definition pointing back at this daemon.
pub fn webhook_template(base_url: &str, secret: &str) -> Value {
    json!({
        "name": "Pulse Integration",
        "url": format!("{}{}", base_url.trim_end_matches('/'), WEBHOOK_PATH),
        "headers": {
            "Content-Type": "application/json",
            "X-Pulse-Token": mask_secret(secret),
        },
        "payload": {
            "ProblemNotification": {
                "PID": "{PID}",
                "ProblemTitle": "{ProblemTitle}",
                "State": "{State}",
                "ProblemDetailsText": "{ProblemDetailsText}",
                "ProblemURL": "{ProblemURL}",
                "ImpactedEntities": "{ImpactedEntities}",
                "Tags": "{Tags}"
            }
        },
        "events": ["PROBLEM_OPENED", "PROBLEM_RESOLVED", "PROBLEM_UPDATED"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use pulse_shared::event::EventKind;

    #[test]
    fn test_problem_notification() {
        let event = normalize(json!({
            "ProblemNotification": {"PID": "P1", "State": "OPEN", "ProblemTitle": "X"}
        }));
        assert_eq!(event.id, "P1");
        assert_eq!(event.kind(), EventKind::Problem);
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.status, "OPEN");
        assert_eq!(event.title, "X");
        assert_eq!(event.source, WEBHOOK_SOURCE);
        assert!(matches!(
            event.detail,
            EventDetail::Problem { end_time: None, start_time: None, .. }
        ));
    }

    #[test]
    fn test_resolved_problem_with_numeric_id() {
        let event = normalize(json!({
            "ProblemNotification": {
                "problemId": 4711,
                "State": "RESOLVED",
                "ProblemDetailsText": "Problem 4711\nStarted: 2024-03-01T10:15:00Z\nImpact: high",
                "ImpactedEntities": [{"entity": "SERVICE-1"}, {"entity": "SERVICE-2"}],
                "Tags": ["prod"]
            }
        }));
        assert_eq!(event.id, "4711");
        assert_eq!(event.severity, Severity::Resolved);
        assert_eq!(event.affected_entities.as_ref().map(|a| a.count()), Some(2));
        match event.detail {
            EventDetail::Problem { start_time, end_time, tags, .. } => {
                let start = start_time.unwrap();
                assert_eq!((start.month(), start.day(), start.hour()), (3, 1, 10));
                assert!(end_time.is_some());
                assert_eq!(tags, vec![json!("prod")]);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[test]
    fn test_missing_state_and_id() {
        let event = normalize(json!({"ProblemNotification": {"title": "t"}}));
        assert_eq!(event.status, "UNKNOWN");
        assert_eq!(event.severity, Severity::Resolved);
        assert!(event.id.starts_with("problem_"));
    }

    #[test]
    fn test_metric_event() {
        let event = normalize(json!({
            "MetricEvent": {"metricName": "cpu", "violationState": "VIOLATED", "value": 93.1}
        }));
        assert_eq!(event.title, "Metric Alert: cpu");
        assert_eq!(event.severity, Severity::Warning);
        assert!(event.id.starts_with("metric_"));

        let calm = normalize(json!({"MetricEvent": {"metricName": "cpu"}}));
        assert_eq!(calm.severity, Severity::Info);
        assert_eq!(calm.status, "UNKNOWN");
    }

    #[test]
    fn test_deployment_event() {
        let event = normalize(json!({
            "DeploymentEvent": {
                "deploymentName": "checkout",
                "deploymentStatus": "SUCCESS",
                "deploymentVersion": "1.4.2"
            }
        }));
        assert_eq!(event.title, "Deployment: checkout");
        assert_eq!(event.status, "SUCCESS");
        assert!(matches!(
            event.detail,
            EventDetail::Deployment { version: Some(ref v), .. } if v == "1.4.2"
        ));
    }

    #[test]
    fn test_dispatch_order_and_fallbacks() {
        // Problem wins over metric
        let both = normalize(json!({
            "MetricEvent": {"metricName": "cpu"},
            "ProblemNotification": {"PID": "P9", "State": "OPEN"}
        }));
        assert_eq!(both.kind(), EventKind::Problem);

        // Known key with a body of the wrong shape
        let bad = normalize(json!({"ProblemNotification": {"State": 12}}));
        assert_eq!(bad.kind(), EventKind::Generic);
        assert_eq!(bad.title, "Dynatrace Event");
        assert_eq!(bad.status, "RECEIVED");

        let null_key = normalize(json!({"ProblemNotification": null, "foo": 1}));
        assert_eq!(null_key.kind(), EventKind::Generic);
        assert!(matches!(null_key.detail, EventDetail::Generic { ref data } if data["foo"] == 1));
    }

    #[test]
    fn test_normalize_is_idempotent_apart_from_stamps() {
        let raw = json!({"ProblemNotification": {"PID": "P2", "State": "OPEN", "ProblemTitle": "Y"}});
        let mut a = normalize(raw.clone());
        let b = normalize(raw);
        a.timestamp = b.timestamp;
        assert_eq!(a, b);
    }

    #[test]
    fn test_start_time_formats() {
        assert!(extract_start_time("Started: 2024-03-01 10:15:00 UTC, host x").is_some());
        let offset = extract_start_time("Started: 2024-03-01T11:15:00+01:00\n").unwrap();
        assert_eq!(offset.hour(), 10);
        assert!(extract_start_time("Started: whenever").is_none());
        assert!(extract_start_time("no marker").is_none());
    }

    #[test]
    fn test_template_masks_secret() {
        let template = webhook_template("https://pulse.example.com/", "supersecret");
        assert_eq!(template["url"], "https://pulse.example.com/api/webhooks/dynatrace");
        assert_eq!(template["headers"]["X-Pulse-Token"], "supe****");
        assert_eq!(mask_secret("abc"), "****");
    }
}
