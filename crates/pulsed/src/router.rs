//! Deterministic intent router for chat queries.
//!
//! An ordered keyword table over the lowercased query; the first rule with
//! a matching term wins. Terms overlap between rules (`down`, `failing`),
//! so the order is part of the behaviour.

use pulse_shared::intent::{Intent, IntentKind};
use tracing::debug;

/// One row of the routing table
struct Rule {
    kind: IntentKind,
    confidence: f32,
    terms: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        kind: IntentKind::HealthStatus,
        confidence: 0.9,
        terms: &["health", "status", "how is", "overall", "system status", "everything ok"],
    },
    Rule {
        kind: IntentKind::CriticalServices,
        confidence: 0.95,
        terms: &["down", "critical", "failing", "broken", "not working", "offline", "crashed"],
    },
    Rule {
        kind: IntentKind::ServiceSpecific,
        confidence: 0.8,
        terms: &["service", "api", "endpoint", "microservice", "application"],
    },
    Rule {
        kind: IntentKind::Infrastructure,
        confidence: 0.8,
        terms: &["server", "host", "cpu", "memory", "disk", "infrastructure"],
    },
    Rule {
        kind: IntentKind::Database,
        confidence: 0.8,
        terms: &["database", "db", "sql", "mysql", "postgres", "mongodb"],
    },
    Rule {
        kind: IntentKind::Kubernetes,
        confidence: 0.8,
        terms: &["kubernetes", "k8s", "pod", "container", "cluster", "deployment"],
    },
    Rule {
        kind: IntentKind::Network,
        confidence: 0.8,
        terms: &["network", "bandwidth", "latency", "connection", "traffic"],
    },
    Rule {
        kind: IntentKind::Problems,
        confidence: 0.9,
        terms: &["problem", "alert", "issue", "error", "down", "failing"],
    },
    Rule {
        kind: IntentKind::Recommendations,
        confidence: 0.7,
        terms: &["recommend", "suggest", "what should", "advice", "optimize"],
    },
];

const GENERAL_CONFIDENCE: f32 = 0.5;

/// Words after which the service name follows
const SERVICE_MARKERS: [&str; 3] = ["service", "api", "microservice"];

/// Classify a free-text query
pub fn classify_query(query: &str) -> Intent {
    let q = query.to_lowercase();

    let matched = RULES
        .iter()
        .find(|rule| rule.terms.iter().any(|term| q.contains(term)));

    let intent = match matched {
        Some(rule) if rule.kind == IntentKind::ServiceSpecific => {
            let mut intent = Intent::new(rule.kind, rule.confidence);
            intent.service_name = extract_service_name(query);
            intent
        }
        Some(rule) => Intent::new(rule.kind, rule.confidence),
        None => Intent::new(IntentKind::General, GENERAL_CONFIDENCE),
    };

    debug!("[CHAT] Routed {:?} -> {}", query, intent.kind);
    intent
}

/// Word following the first `service` / `api` / `microservice` word.
pub fn extract_service_name(query: &str) -> Option<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let marker = words
        .iter()
        .position(|w| SERVICE_MARKERS.contains(&w.to_lowercase().as_str()))?;
    words
        .get(marker + 1)
        .map(|w| w.trim_end_matches(|c: char| matches!(c, '?' | '!' | '.' | ',')))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}
