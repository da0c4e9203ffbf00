//! Per-domain analysis: provider data in, `ComponentReport` out.
//!
//! Failure isolation is two-level. A failing item (one service's metrics,
//! one evaluation) is logged and skipped. A failing domain-level fetch turns
//! the whole report into `unknown` with the error attached. Neither ever
//! touches sibling domains.

use crate::provider::{
    Entity, MetricBundle, MetricSeries, MetricsGateway, Problem, SyntheticMonitor, DB_CALL_COUNT,
    DB_CALL_TIME, HOST_CPU, HOST_DISK, HOST_MEMORY, HOST_NET_RX, HOST_NET_TX, HOST_PACKETS_RX,
    HOST_PACKETS_TX, K8S_CLUSTER_PODS, SERVICE_ERROR_RATE, SERVICE_REQUEST_COUNT,
    SERVICE_RESPONSE_TIME,
};
use chrono::{DateTime, Utc};
use pulse_shared::snapshot::{ComponentReport, Domain, ItemDetail, ItemRecord};
use pulse_shared::thresholds::{MetricKind, ThresholdSet};
use pulse_shared::{PulseResult, Status};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

// Metric keys on item records
pub const RESPONSE_TIME: &str = "responseTime";
pub const ERROR_RATE: &str = "errorRate";
pub const REQUEST_COUNT: &str = "requestCount";
pub const CPU_USAGE: &str = "cpuUsage";
pub const MEMORY_USAGE: &str = "memoryUsage";
pub const DISK_USAGE: &str = "diskUsage";

pub const SERVICE_ENTITY: &str = "SERVICE";
pub const HOST_ENTITY: &str = "HOST";
pub const CLUSTER_ENTITY: &str = "KUBERNETES_CLUSTER";

/// Name of the aggregate record leading the problems domain.
pub const PROBLEM_FEED: &str = "Problem feed";

/// Runs the per-domain strategies against one gateway.
#[derive(Clone)]
pub struct ComponentAnalyzer {
    gateway: Arc<dyn MetricsGateway>,
    thresholds: ThresholdSet,
    service_limit: usize,
}

impl ComponentAnalyzer {
    pub fn new(gateway: Arc<dyn MetricsGateway>, thresholds: ThresholdSet, service_limit: usize) -> Self {
        Self {
            gateway,
            thresholds,
            service_limit,
        }
    }

    /// All seven domains, concurrently.
    pub async fn analyze_all(&self) -> BTreeMap<Domain, ComponentReport> {
        let (services, infrastructure, databases, kubernetes, problems, network, synthetic) = tokio::join!(
            self.analyze(Domain::Services),
            self.analyze(Domain::Infrastructure),
            self.analyze(Domain::Databases),
            self.analyze(Domain::Kubernetes),
            self.analyze(Domain::Problems),
            self.analyze(Domain::Network),
            self.analyze(Domain::Synthetic),
        );

        let mut components = BTreeMap::new();
        components.insert(Domain::Services, services);
        components.insert(Domain::Infrastructure, infrastructure);
        components.insert(Domain::Databases, databases);
        components.insert(Domain::Kubernetes, kubernetes);
        components.insert(Domain::Problems, problems);
        components.insert(Domain::Network, network);
        components.insert(Domain::Synthetic, synthetic);
        components
    }

    /// One domain. Domain-level errors become an `unknown` report.
    pub async fn analyze(&self, domain: Domain) -> ComponentReport {
        let result = match domain {
            Domain::Services => self.services().await,
            Domain::Infrastructure => self.infrastructure().await,
            Domain::Databases => self.databases().await,
            Domain::Kubernetes => self.kubernetes().await,
            Domain::Problems => self.problems().await,
            Domain::Network => self.network().await,
            Domain::Synthetic => self.synthetic().await,
        };
        match result {
            Ok(report) => {
                debug!("[AGG] {} -> {}", domain, report.status);
                report
            }
            Err(e) => {
                error!("[AGG] Error analyzing {}: {}", domain, e);
                ComponentReport::failed(e.to_string())
            }
        }
    }

    async fn services(&self) -> PulseResult<ComponentReport> {
        let entities = self.gateway.entities(SERVICE_ENTITY).await?;

        let mut set = JoinSet::new();
        for (index, entity) in entities.into_iter().take(self.service_limit).enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let thresholds = self.thresholds.clone();
            set.spawn(async move {
                let outcome = match gateway.service_metrics(&entity.entity_id).await {
                    Ok(bundle) => evaluate_service(&entity, &bundle, &thresholds),
                    Err(e) => Err(e),
                };
                (index, entity.label().to_string(), outcome)
            });
        }

        let mut analyzed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, _, Ok(item))) => analyzed.push((index, item)),
                Ok((_, name, Err(e))) => warn!("[AGG] Failed to analyze service {}: {}", name, e),
                Err(e) => warn!("[AGG] Service analysis task failed: {}", e),
            }
        }
        analyzed.sort_by_key(|(index, _)| *index);
        let items: Vec<ItemRecord> = analyzed.into_iter().map(|(_, item)| item).collect();

        Ok(ComponentReport::from_items(
            format!("{} services analyzed", items.len()),
            items,
        ))
    }

    async fn infrastructure(&self) -> PulseResult<ComponentReport> {
        let (metrics, hosts) = tokio::try_join!(
            self.gateway.infrastructure_metrics(),
            self.gateway.entities(HOST_ENTITY)
        )?;

        let mut items = Vec::with_capacity(hosts.len());
        for host in &hosts {
            match evaluate_host(host, &metrics, &self.thresholds) {
                Ok(item) => items.push(item),
                Err(e) => warn!("[AGG] Failed to analyze host {}: {}", host.label(), e),
            }
        }

        Ok(ComponentReport::from_items(
            format!("{} hosts analyzed", items.len()),
            items,
        ))
    }

    async fn databases(&self) -> PulseResult<ComponentReport> {
        let (metrics, services) = tokio::try_join!(
            self.gateway.database_metrics(),
            self.gateway.entities(SERVICE_ENTITY)
        )?;

        let items: Vec<ItemRecord> = services
            .iter()
            .filter_map(|svc| svc.database_vendor().map(|vendor| database_item(svc, vendor, &metrics)))
            .collect();

        Ok(ComponentReport::from_items(
            format!("{} database services found", items.len()),
            items,
        ))
    }

    async fn kubernetes(&self) -> PulseResult<ComponentReport> {
        let (metrics, clusters) = tokio::try_join!(
            self.gateway.kubernetes_metrics(),
            self.gateway.entities(CLUSTER_ENTITY)
        )?;

        let items: Vec<ItemRecord> = clusters
            .iter()
            .map(|cluster| {
                let item = ItemRecord::new(cluster.label(), Status::Healthy, ItemDetail::Cluster {});
                match metrics.get(K8S_CLUSTER_PODS) {
                    Some(series) => item.with_metric("pods", series.latest_value_for(&cluster.entity_id)),
                    None => item,
                }
            })
            .collect();

        Ok(ComponentReport::from_items(
            format!("{} Kubernetes clusters found", items.len()),
            items,
        ))
    }

    async fn problems(&self) -> PulseResult<ComponentReport> {
        let problems = self.gateway.problems().await?;
        Ok(problem_report(&problems))
    }

    async fn network(&self) -> PulseResult<ComponentReport> {
        let series = self.gateway.network_metrics().await?;
        Ok(ComponentReport::from_items(
            "Network metrics collected",
            vec![network_item(&series)],
        ))
    }

    async fn synthetic(&self) -> PulseResult<ComponentReport> {
        let monitors = self.gateway.synthetic_monitors().await?;
        let items: Vec<ItemRecord> = monitors.iter().map(monitor_item).collect();
        let enabled = monitors.iter().filter(|m| m.enabled).count();
        Ok(ComponentReport::from_items(
            format!("{} synthetic monitors ({} enabled)", items.len(), enabled),
            items,
        ))
    }
}

/// Evaluate one metric on an item: record it, raise status, append issue.
fn apply_reading(
    item: &mut ItemRecord,
    thresholds: &ThresholdSet,
    kind: MetricKind,
    key: &str,
    value: f64,
) -> PulseResult<()> {
    let status = thresholds.classify(kind, value)?;
    item.metrics.insert(key.to_string(), value);
    item.status = item.status.worst(status);
    if let Some(issue) = thresholds.issue_for(kind, value)? {
        item.issues.push(issue);
    }
    Ok(())
}

pub fn evaluate_service(
    entity: &Entity,
    bundle: &MetricBundle,
    thresholds: &ThresholdSet,
) -> PulseResult<ItemRecord> {
    let mut item = ItemRecord::new(
        entity.label(),
        Status::Healthy,
        ItemDetail::Service {
            entity_id: entity.entity_id.clone(),
        },
    );

    if let Some(series) = bundle.get(SERVICE_RESPONSE_TIME) {
        let value = series.latest_value_for(&entity.entity_id);
        apply_reading(&mut item, thresholds, MetricKind::ResponseTime, RESPONSE_TIME, value)?;
    }
    if let Some(series) = bundle.get(SERVICE_ERROR_RATE) {
        let value = series.latest_value_for(&entity.entity_id);
        apply_reading(&mut item, thresholds, MetricKind::ErrorRate, ERROR_RATE, value)?;
    }
    if let Some(series) = bundle.get(SERVICE_REQUEST_COUNT) {
        item.metrics
            .insert(REQUEST_COUNT.to_string(), series.latest_value_for(&entity.entity_id));
    }
    Ok(item)
}

pub fn evaluate_host(
    host: &Entity,
    bundle: &MetricBundle,
    thresholds: &ThresholdSet,
) -> PulseResult<ItemRecord> {
    let mut item = ItemRecord::new(
        host.label(),
        Status::Healthy,
        ItemDetail::Host {
            entity_id: host.entity_id.clone(),
        },
    );

    let readings = [
        (HOST_CPU, MetricKind::Cpu, CPU_USAGE),
        (HOST_MEMORY, MetricKind::Memory, MEMORY_USAGE),
        (HOST_DISK, MetricKind::DiskUsage, DISK_USAGE),
    ];
    for (metric, kind, key) in readings {
        if let Some(series) = bundle.get(metric) {
            let value = series.latest_value_for(&host.entity_id);
            apply_reading(&mut item, thresholds, kind, key, value)?;
        }
    }
    Ok(item)
}

pub(crate) fn database_item(service: &Entity, vendor: &str, metrics: &MetricSeries) -> ItemRecord {
    let mut item = ItemRecord::new(
        service.label(),
        Status::Healthy,
        ItemDetail::Database {
            vendor: vendor.to_string(),
        },
    );
    for (metric, key) in [(DB_CALL_COUNT, "dbCallCount"), (DB_CALL_TIME, "dbCallTime")] {
        if let Some(group) = metrics.group(metric) {
            item.metrics
                .insert(key.to_string(), group.latest_for(&service.entity_id));
        }
    }
    item
}

fn problem_status(severity_level: &str) -> Status {
    match severity_level {
        "ERROR" => Status::Critical,
        "WARNING" => Status::Warning,
        _ => Status::Healthy,
    }
}

/// Feed record first, then one record per problem.
pub fn problem_report(problems: &[Problem]) -> ComponentReport {
    let critical = problems.iter().filter(|p| p.severity_level == "ERROR").count();
    let warnings = problems.iter().filter(|p| p.severity_level == "WARNING").count();
    let feed_status = if critical > 0 {
        Status::Critical
    } else if warnings > 0 {
        Status::Warning
    } else {
        Status::Healthy
    };

    let mut items = Vec::with_capacity(problems.len() + 1);
    items.push(
        ItemRecord::new(PROBLEM_FEED, feed_status, ItemDetail::ProblemFeed {})
            .with_metric("total", problems.len() as f64)
            .with_metric("critical", critical as f64)
            .with_metric("warnings", warnings as f64),
    );
    items.extend(problems.iter().map(|p| {
        ItemRecord::new(
            p.title.clone(),
            problem_status(&p.severity_level),
            ItemDetail::Problem {
                id: p.problem_id.clone(),
                severity: p.severity_level.clone(),
                problem_status: p.status.clone(),
                start_time: p.start_time.and_then(DateTime::<Utc>::from_timestamp_millis),
                affected_entities: p.affected_entities.len() as u64,
            },
        )
    }));

    ComponentReport::from_items(
        format!(
            "{} open problems ({} critical, {} warnings)",
            problems.len(),
            critical,
            warnings
        ),
        items,
    )
}

pub(crate) fn network_item(series: &MetricSeries) -> ItemRecord {
    let counters = [
        (HOST_NET_RX, "bytesRx"),
        (HOST_NET_TX, "bytesTx"),
        (HOST_PACKETS_RX, "packetsRx"),
        (HOST_PACKETS_TX, "packetsTx"),
    ];
    counters.into_iter().fold(
        ItemRecord::new("Network", Status::Healthy, ItemDetail::Network {}),
        |item, (metric, key)| {
            let value = series.group(metric).map(|g| g.latest()).unwrap_or(0.0);
            item.with_metric(key, value)
        },
    )
}

pub(crate) fn monitor_item(monitor: &SyntheticMonitor) -> ItemRecord {
    let status = if monitor.enabled {
        Status::Healthy
    } else {
        Status::NotFound
    };
    let name = if monitor.name.is_empty() {
        monitor.entity_id.clone()
    } else {
        monitor.name.clone()
    };
    ItemRecord::new(
        name,
        status,
        ItemDetail::Monitor {
            monitor_type: monitor.monitor_type.clone(),
            enabled: monitor.enabled,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FakeGateway;
    use pulse_shared::thresholds::Threshold;
    use serde_json::Value;

    fn bundle(entries: &[(&str, MetricSeries)]) -> MetricBundle {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn analyzer(fake: FakeGateway) -> ComponentAnalyzer {
        ComponentAnalyzer::new(Arc::new(fake), ThresholdSet::default(), 10)
    }

    #[test]
    fn test_service_evaluation_issues() {
        let entity = Entity::new("SERVICE-1", "Payments");
        let metrics = bundle(&[
            (SERVICE_RESPONSE_TIME, MetricSeries::single(SERVICE_RESPONSE_TIME, 3200.0)),
            (SERVICE_ERROR_RATE, MetricSeries::single(SERVICE_ERROR_RATE, 2.5)),
        ]);
        let item = evaluate_service(&entity, &metrics, &ThresholdSet::default()).unwrap();
        assert_eq!(item.status, Status::Critical);
        assert_eq!(
            item.issues,
            vec![
                "Critical response time: 3200ms".to_string(),
                "High error rate: 2.50%".to_string()
            ]
        );
        assert_eq!(item.metric(RESPONSE_TIME), Some(3200.0));
    }

    #[test]
    fn test_service_without_metrics_is_healthy() {
        let entity = Entity::new("SERVICE-2", "Quiet");
        let item = evaluate_service(&entity, &MetricBundle::new(), &ThresholdSet::default()).unwrap();
        assert_eq!(item.status, Status::Healthy);
        assert!(item.metrics.is_empty());
    }

    #[test]
    fn test_host_uses_its_own_row() {
        let metrics = bundle(&[
            (HOST_CPU, MetricSeries::per_entity(HOST_CPU, &[("HOST-1", 30.0), ("HOST-2", 78.0)])),
            (HOST_MEMORY, MetricSeries::per_entity(HOST_MEMORY, &[("HOST-1", 91.0), ("HOST-2", 50.0)])),
        ]);
        let t = ThresholdSet::default();
        let h1 = evaluate_host(&Entity::new("HOST-1", "a"), &metrics, &t).unwrap();
        let h2 = evaluate_host(&Entity::new("HOST-2", "b"), &metrics, &t).unwrap();
        assert_eq!(h1.status, Status::Critical);
        assert_eq!(h1.issues, vec!["Critical memory usage: 91%".to_string()]);
        assert_eq!(h2.status, Status::Warning);
        assert_eq!(h2.issues, vec!["High CPU usage: 78%".to_string()]);
    }

    #[test]
    fn test_problem_feed_leads() {
        let problems = vec![
            Problem {
                problem_id: "P-1".into(),
                title: "Disk full".into(),
                severity_level: "WARNING".into(),
                status: "OPEN".into(),
                start_time: Some(1_700_000_000_000),
                affected_entities: vec![Value::from("HOST-1")],
            },
            Problem {
                problem_id: "P-2".into(),
                title: "Checkout failing".into(),
                severity_level: "ERROR".into(),
                status: "OPEN".into(),
                start_time: None,
                affected_entities: vec![],
            },
        ];
        let report = problem_report(&problems);
        assert_eq!(report.status, Status::Critical);
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.items[0].name, PROBLEM_FEED);
        assert_eq!(report.items[0].metric("total"), Some(2.0));
        assert_eq!(report.items[0].metric("critical"), Some(1.0));
        assert_eq!(report.items[0].metric("warnings"), Some(1.0));
        assert_eq!(report.items[1].status, Status::Warning);
    }

    #[test]
    fn test_no_problems_is_healthy() {
        let report = problem_report(&[]);
        assert_eq!(report.status, Status::Healthy);
        assert_eq!(report.items.len(), 1);
    }

    #[tokio::test]
    async fn test_services_capped_and_ordered() {
        let entities: Vec<Entity> = (0..15)
            .map(|i| Entity::new(&format!("SERVICE-{}", i), &format!("svc-{}", i)))
            .collect();
        let fake = FakeGateway::new().with_entities(SERVICE_ENTITY, entities);
        let report = analyzer(fake).analyze(Domain::Services).await;
        assert_eq!(report.items.len(), 10);
        let names: Vec<&str> = report.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names[0], "svc-0");
        assert_eq!(names[9], "svc-9");
    }

    #[tokio::test]
    async fn test_failing_service_is_skipped() {
        let fake = FakeGateway::new()
            .with_entities(
                SERVICE_ENTITY,
                vec![Entity::new("SERVICE-1", "ok"), Entity::new("SERVICE-2", "broken")],
            )
            .failing("service_metrics:SERVICE-2");
        let report = analyzer(fake).analyze(Domain::Services).await;
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].name, "ok");
        assert_eq!(report.status, Status::Healthy);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_unregistered_threshold_skips_item() {
        let fake = FakeGateway::new()
            .with_entities(SERVICE_ENTITY, vec![Entity::new("SERVICE-1", "svc")])
            .with_service_metrics(
                "SERVICE-1",
                bundle(&[(SERVICE_RESPONSE_TIME, MetricSeries::single(SERVICE_RESPONSE_TIME, 5.0))]),
            );
        let thresholds = ThresholdSet::empty().with(MetricKind::ErrorRate, Threshold::new(1.0, 5.0));
        let report = ComponentAnalyzer::new(Arc::new(fake), thresholds, 10)
            .analyze(Domain::Services)
            .await;
        assert!(report.items.is_empty());
        assert_eq!(report.status, Status::Unknown);
    }

    #[tokio::test]
    async fn test_domain_failure_is_unknown_and_isolated() {
        let fake = FakeGateway::new()
            .with_entities(HOST_ENTITY, vec![Entity::new("HOST-1", "web")])
            .failing("problems");
        let components = analyzer(fake).analyze_all().await;
        let problems = &components[&Domain::Problems];
        assert_eq!(problems.status, Status::Unknown);
        assert!(problems.error.as_deref().unwrap_or("").contains("scripted failure"));
        assert_eq!(components[&Domain::Infrastructure].status, Status::Healthy);
        assert_eq!(components[&Domain::Network].status, Status::Healthy);
        assert_eq!(components.len(), 7);
    }

    #[tokio::test]
    async fn test_databases_and_monitors() {
        let fake = FakeGateway::new()
            .with_entities(
                SERVICE_ENTITY,
                vec![
                    Entity::new("SERVICE-1", "api"),
                    Entity::new("SERVICE-2", "orders-db")
                        .with_property("databaseVendor", Value::from("PostgreSQL")),
                ],
            )
            .with_database_metrics(MetricSeries::per_entity(DB_CALL_TIME, &[("SERVICE-2", 12.0)]))
            .with_monitors(vec![
                SyntheticMonitor {
                    entity_id: "SYNTHETIC_TEST-1".into(),
                    name: "Login flow".into(),
                    monitor_type: "BROWSER".into(),
                    enabled: true,
                },
                SyntheticMonitor {
                    entity_id: "HTTP_CHECK-2".into(),
                    name: "Legacy ping".into(),
                    monitor_type: "HTTP".into(),
                    enabled: false,
                },
            ]);
        let a = analyzer(fake);

        let dbs = a.analyze(Domain::Databases).await;
        assert_eq!(dbs.items.len(), 1);
        assert_eq!(dbs.items[0].metric("dbCallTime"), Some(12.0));
        assert!(matches!(&dbs.items[0].detail, ItemDetail::Database { vendor } if vendor == "PostgreSQL"));

        let synthetic = a.analyze(Domain::Synthetic).await;
        assert_eq!(synthetic.items[1].status, Status::NotFound);
        assert_eq!(synthetic.status, Status::Healthy);

        let k8s = a.analyze(Domain::Kubernetes).await;
        assert_eq!(k8s.status, Status::Unknown);
    }
}
