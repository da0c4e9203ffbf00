//! Deterministic demo data, served when no provider is configured or a
//! live aggregation blows up.
//!
//! Built through the same evaluators as live data so the invariants hold:
//! component status is the item rollup and the overall verdict follows.

use crate::analyzers::{
    database_item, evaluate_host, evaluate_service, monitor_item, network_item, problem_report,
    ERROR_RATE, RESPONSE_TIME,
};
use crate::provider::{
    Entity, MetricBundle, MetricSeries, Problem, SyntheticMonitor, HOST_CPU, HOST_MEMORY,
    HOST_NET_RX, HOST_NET_TX, HOST_PACKETS_RX, HOST_PACKETS_TX, SERVICE_ERROR_RATE,
    SERVICE_RESPONSE_TIME,
};
use chrono::{Duration, Utc};
use pulse_shared::event::{Event, EventDetail, Severity};
use pulse_shared::snapshot::{
    ComponentReport, Domain, HealthSnapshot, ItemDetail, ItemRecord, SnapshotSource,
};
use pulse_shared::{Status, ThresholdSet};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Source tag of fixture events.
pub const DEMO_SOURCE: &str = "demo_data";

// (name, response time ms, error rate %)
const SERVICES: [(&str, f64, f64); 4] = [
    ("User Authentication Service", 145.0, 0.1),
    ("Payment Processing API", 3200.0, 8.5),
    ("Inventory Management", 234.0, 0.0),
    ("Notification Service", 67.0, 0.2),
];

const DOWN_SERVICE: &str = "Email Service";

// (name, cpu %, memory %)
const HOSTS: [(&str, f64, f64); 3] = [
    ("web-server-01", 45.0, 67.0),
    ("api-server-02", 78.0, 85.0),
    ("db-server-01", 23.0, 56.0),
];

const DATABASES: [(&str, &str); 3] = [
    ("Primary PostgreSQL", "PostgreSQL"),
    ("Redis Cache", "Redis"),
    ("Analytics MongoDB", "MongoDB"),
];

const CLUSTERS: [&str; 2] = ["production-cluster", "staging-cluster"];

// (id, title, severity level, minutes ago)
const PROBLEMS: [(&str, &str, &str, i64); 3] = [
    ("DEMO-001", "Payment Processing API Error Rate Critical", "ERROR", 45),
    ("DEMO-002", "Payment API Response Time Elevated", "WARNING", 60),
    ("DEMO-003", "High Memory Usage on API Server", "WARNING", 30),
];

// (name, type)
const MONITORS: [(&str, &str); 5] = [
    ("Homepage availability", "HTTP"),
    ("Login flow", "BROWSER"),
    ("Checkout journey", "BROWSER"),
    ("Payment API health", "HTTP"),
    ("Search API latency", "HTTP"),
];

fn entity_id(prefix: &str, index: usize) -> String {
    format!("{}-DEMO{:04}", prefix, index + 1)
}

fn demo_services(thresholds: &ThresholdSet) -> Vec<ItemRecord> {
    let mut items: Vec<ItemRecord> = SERVICES
        .iter()
        .enumerate()
        .filter_map(|(i, (name, rt, er))| {
            let entity = Entity::new(&entity_id("SERVICE", i), name);
            let bundle: MetricBundle = [
                (
                    SERVICE_RESPONSE_TIME.to_string(),
                    MetricSeries::single(SERVICE_RESPONSE_TIME, *rt),
                ),
                (
                    SERVICE_ERROR_RATE.to_string(),
                    MetricSeries::single(SERVICE_ERROR_RATE, *er),
                ),
            ]
            .into_iter()
            .collect();
            evaluate_service(&entity, &bundle, thresholds)
                .map_err(|e| warn!("[AGG] Demo service {} skipped: {}", name, e))
                .ok()
        })
        .collect();

    let down = ItemRecord::new(
        DOWN_SERVICE,
        Status::Down,
        ItemDetail::Service {
            entity_id: entity_id("SERVICE", SERVICES.len()),
        },
    )
    .with_metric(RESPONSE_TIME, 0.0)
    .with_metric(ERROR_RATE, 100.0)
    .with_issue("Service unreachable")
    .with_issue("Connection timeout");
    // Keep the down service in the middle of the list, where dashboards expect it
    items.insert(items.len().min(2), down);
    items
}

fn demo_hosts(thresholds: &ThresholdSet) -> Vec<ItemRecord> {
    let hosts: Vec<Entity> = HOSTS
        .iter()
        .enumerate()
        .map(|(i, (name, _, _))| Entity::new(&entity_id("HOST", i), name))
        .collect();
    let cpu: Vec<(&str, f64)> = hosts
        .iter()
        .zip(HOSTS.iter())
        .map(|(h, (_, cpu, _))| (h.entity_id.as_str(), *cpu))
        .collect();
    let memory: Vec<(&str, f64)> = hosts
        .iter()
        .zip(HOSTS.iter())
        .map(|(h, (_, _, mem))| (h.entity_id.as_str(), *mem))
        .collect();
    let bundle: MetricBundle = [
        (HOST_CPU.to_string(), MetricSeries::per_entity(HOST_CPU, &cpu)),
        (HOST_MEMORY.to_string(), MetricSeries::per_entity(HOST_MEMORY, &memory)),
    ]
    .into_iter()
    .collect();

    hosts
        .iter()
        .filter_map(|host| {
            evaluate_host(host, &bundle, thresholds)
                .map_err(|e| warn!("[AGG] Demo host {} skipped: {}", host.label(), e))
                .ok()
        })
        .collect()
}

fn demo_problems() -> ComponentReport {
    let now = Utc::now();
    let problems: Vec<Problem> = PROBLEMS
        .iter()
        .map(|(id, title, severity, minutes_ago)| Problem {
            problem_id: id.to_string(),
            title: title.to_string(),
            severity_level: severity.to_string(),
            status: "OPEN".to_string(),
            start_time: Some((now - Duration::minutes(*minutes_ago)).timestamp_millis()),
            affected_entities: vec![Value::from(entity_id("SERVICE", 1))],
        })
        .collect();
    problem_report(&problems)
}

fn demo_network() -> ComponentReport {
    let series = [
        (HOST_NET_RX, 1_250_000.0),
        (HOST_NET_TX, 980_000.0),
        (HOST_PACKETS_RX, 8_400.0),
        (HOST_PACKETS_TX, 7_900.0),
    ]
    .into_iter()
    .fold(MetricSeries::default(), |acc, (metric, value)| {
        acc.merge(MetricSeries::single(metric, value))
    });
    ComponentReport::from_items(
        "Network performance within normal parameters",
        vec![network_item(&series)],
    )
}

/// The demo snapshot. Overall verdict is critical: one service is down and
/// one breaches its critical thresholds.
pub fn demo_snapshot(thresholds: &ThresholdSet) -> HealthSnapshot {
    let services = demo_services(thresholds);
    let down = services.iter().filter(|s| s.status == Status::Down).count();
    let critical = services.iter().filter(|s| s.status == Status::Critical).count();
    let healthy = services.iter().filter(|s| s.status == Status::Healthy).count();

    let hosts = demo_hosts(thresholds);

    let databases: Vec<ItemRecord> = DATABASES
        .iter()
        .enumerate()
        .map(|(i, (name, vendor))| {
            database_item(
                &Entity::new(&entity_id("SERVICE", 100 + i), name),
                vendor,
                &MetricSeries::default(),
            )
        })
        .collect();

    let clusters: Vec<ItemRecord> = CLUSTERS
        .iter()
        .map(|name| ItemRecord::new(*name, Status::Healthy, ItemDetail::Cluster {}))
        .collect();

    let monitors: Vec<ItemRecord> = MONITORS
        .iter()
        .enumerate()
        .map(|(i, (name, kind))| {
            monitor_item(&SyntheticMonitor {
                entity_id: entity_id("SYNTHETIC_TEST", i),
                name: name.to_string(),
                monitor_type: kind.to_string(),
                enabled: true,
            })
        })
        .collect();

    let mut components = BTreeMap::new();
    components.insert(
        Domain::Services,
        ComponentReport::from_items(
            format!(
                "{} service down, {} critical, {} healthy",
                down, critical, healthy
            ),
            services,
        ),
    );
    components.insert(
        Domain::Infrastructure,
        ComponentReport::from_items(format!("{} hosts analyzed", hosts.len()), hosts),
    );
    components.insert(
        Domain::Databases,
        ComponentReport::from_items(
            format!("{} database instances healthy", databases.len()),
            databases,
        ),
    );
    components.insert(
        Domain::Kubernetes,
        ComponentReport::from_items(
            format!("{} clusters running smoothly", clusters.len()),
            clusters,
        ),
    );
    components.insert(Domain::Problems, demo_problems());
    components.insert(Domain::Network, demo_network());
    components.insert(
        Domain::Synthetic,
        ComponentReport::from_items(
            format!("{} synthetic monitors passing", monitors.len()),
            monitors,
        ),
    );

    HealthSnapshot::assemble(components, SnapshotSource::Demo)
}

/// Sample events for the events endpoint while running on demo data.
pub fn demo_events() -> Vec<Event> {
    let now = Utc::now();
    let samples = [
        ("problem", Severity::Warning, "API Response Time Alert"),
        ("deployment", Severity::Info, "User Service v2.1.3 Deployed"),
        ("metric", Severity::Info, "CPU Usage Normalized"),
        ("problem", Severity::Critical, "Database Connection Pool Exhausted"),
        ("deployment", Severity::Info, "Frontend v1.8.2 Deployed"),
    ];

    samples
        .iter()
        .enumerate()
        .map(|(i, (kind, severity, title))| {
            let detail = match *kind {
                "problem" => EventDetail::Problem {
                    description: None,
                    url: None,
                    tags: Vec::new(),
                    start_time: None,
                    end_time: None,
                },
                "deployment" => EventDetail::Deployment {
                    name: Some(title.to_string()),
                    version: None,
                    entity: None,
                },
                _ => EventDetail::Metric {
                    metric_name: Some(HOST_CPU.to_string()),
                    value: None,
                    threshold: None,
                    entity: None,
                },
            };
            Event {
                id: format!("demo-event-{}", i + 1),
                title: title.to_string(),
                severity: *severity,
                status: if *severity == Severity::Critical {
                    "RESOLVED".to_string()
                } else {
                    "ACTIVE".to_string()
                },
                timestamp: now - Duration::minutes(30 * i as i64),
                affected_entities: None,
                source: DEMO_SOURCE.to_string(),
                detail,
            }
        })
        .collect()
}
