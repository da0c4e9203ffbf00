//! APM provider access.
//!
//! `MetricsGateway` is the only seam between the analyzers and the outside
//! world. Production uses `DynatraceGateway` (REST over reqwest); tests use
//! `FakeGateway` with scripted responses and failures.

pub mod client;
pub mod fake;

pub use client::{BackoffConfig, DynatraceGateway, RequestStatus};
pub use fake::FakeGateway;

use async_trait::async_trait;
use pulse_shared::rpc::ProviderHealth;
use pulse_shared::PulseResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// Metric selectors
pub const SERVICE_RESPONSE_TIME: &str = "builtin:service.response.time";
pub const SERVICE_ERROR_RATE: &str = "builtin:service.errors.total.rate";
pub const SERVICE_REQUEST_COUNT: &str = "builtin:service.requestCount.total";
pub const SERVICE_CPU_TIME: &str = "builtin:service.cpu.time";
pub const HOST_CPU: &str = "builtin:host.cpu.usage";
pub const HOST_MEMORY: &str = "builtin:host.mem.usage";
pub const HOST_DISK: &str = "builtin:host.disk.usedPct";
pub const HOST_NET_RX: &str = "builtin:host.net.bytesRx";
pub const HOST_NET_TX: &str = "builtin:host.net.bytesTx";
pub const HOST_PACKETS_RX: &str = "builtin:host.net.packetsRx";
pub const HOST_PACKETS_TX: &str = "builtin:host.net.packetsTx";
pub const DB_CALL_COUNT: &str = "builtin:service.dbChildCallCount";
pub const DB_CALL_TIME: &str = "builtin:service.dbChildCallTime";
pub const K8S_CLUSTER_PODS: &str = "builtin:kubernetes.cluster.pods";
pub const K8S_NODE_CPU: &str = "builtin:kubernetes.node.cpu.usage";
pub const K8S_NODE_MEMORY: &str = "builtin:kubernetes.node.memory.usage";
pub const K8S_WORKLOAD_CPU: &str = "builtin:kubernetes.workload.cpu.usage";
pub const K8S_WORKLOAD_MEMORY: &str = "builtin:kubernetes.workload.memory.usage";

pub const SERVICE_METRICS: [&str; 4] = [
    SERVICE_RESPONSE_TIME,
    SERVICE_ERROR_RATE,
    SERVICE_REQUEST_COUNT,
    SERVICE_CPU_TIME,
];

pub const HOST_METRICS: [&str; 5] = [HOST_CPU, HOST_MEMORY, HOST_DISK, HOST_NET_RX, HOST_NET_TX];

pub const KUBERNETES_METRICS: [&str; 5] = [
    K8S_CLUSTER_PODS,
    K8S_NODE_CPU,
    K8S_NODE_MEMORY,
    K8S_WORKLOAD_CPU,
    K8S_WORKLOAD_MEMORY,
];

pub const NETWORK_METRICS: [&str; 4] = [HOST_NET_RX, HOST_NET_TX, HOST_PACKETS_RX, HOST_PACKETS_TX];

pub const DATABASE_METRICS: [&str; 2] = [DB_CALL_COUNT, DB_CALL_TIME];

/// Monitored entity (service, host, cluster ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub entity_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl Entity {
    pub fn new(entity_id: &str, display_name: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            display_name: display_name.to_string(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Vendor of a database service, if this entity is one.
    pub fn database_vendor(&self) -> Option<&str> {
        self.properties
            .get("databaseVendor")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Display name, or the id when the provider sent none.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.entity_id
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityList {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// One row of a metric query result: a dimension tuple and its values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

impl DataRow {
    /// First value of the row, missing or null as 0.
    pub fn first_value(&self) -> f64 {
        self.values.first().copied().flatten().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    #[serde(default)]
    pub metric_id: String,
    #[serde(default)]
    pub data: Vec<DataRow>,
}

impl MetricResult {
    pub fn latest(&self) -> f64 {
        self.data.last().map(DataRow::first_value).unwrap_or(0.0)
    }

    /// Value for one entity when rows are split per entity.
    ///
    /// Rows without dimensions are not per-entity, so the generic latest
    /// value applies. With dimensions, an entity that has no row reads 0.
    pub fn latest_for(&self, entity_id: &str) -> f64 {
        if self.data.iter().all(|row| row.dimensions.is_empty()) {
            return self.latest();
        }
        self.data
            .iter()
            .rev()
            .find(|row| row.dimensions.iter().any(|d| d == entity_id))
            .map(DataRow::first_value)
            .unwrap_or(0.0)
    }
}

/// Metric query answer (`/api/v2/metrics/query`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    #[serde(default)]
    pub result: Vec<MetricResult>,
}

impl MetricSeries {
    /// Series holding a single undimensioned reading.
    pub fn single(metric_id: &str, value: f64) -> Self {
        Self {
            result: vec![MetricResult {
                metric_id: metric_id.to_string(),
                data: vec![DataRow {
                    dimensions: Vec::new(),
                    values: vec![Some(value)],
                }],
            }],
        }
    }

    /// Series with one row per entity.
    pub fn per_entity(metric_id: &str, readings: &[(&str, f64)]) -> Self {
        Self {
            result: vec![MetricResult {
                metric_id: metric_id.to_string(),
                data: readings
                    .iter()
                    .map(|(id, v)| DataRow {
                        dimensions: vec![id.to_string()],
                        values: vec![Some(*v)],
                    })
                    .collect(),
            }],
        }
    }

    /// Latest value: last row of the first result group, first value in
    /// that row. Empty or missing data reads 0.
    pub fn latest_value(&self) -> f64 {
        self.result.first().map(MetricResult::latest).unwrap_or(0.0)
    }

    pub fn latest_value_for(&self, entity_id: &str) -> f64 {
        self.result
            .first()
            .map(|r| r.latest_for(entity_id))
            .unwrap_or(0.0)
    }

    /// Result group for one metric of a multi-selector query.
    pub fn group(&self, metric_id: &str) -> Option<&MetricResult> {
        self.result
            .iter()
            .find(|r| r.metric_id == metric_id || r.metric_id.starts_with(metric_id))
    }

    pub fn merge(mut self, other: MetricSeries) -> Self {
        self.result.extend(other.result);
        self
    }
}

/// Metric selector -> query answer.
pub type MetricBundle = HashMap<String, MetricSeries>;

/// Open problem as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub problem_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub severity_level: String,
    #[serde(default)]
    pub status: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub affected_entities: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemList {
    #[serde(default)]
    pub problems: Vec<Problem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticMonitor {
    pub entity_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub monitor_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorList {
    #[serde(default)]
    pub monitors: Vec<SyntheticMonitor>,
}

/// Everything the analyzers need from the provider.
#[async_trait]
pub trait MetricsGateway: Send + Sync {
    /// Entities of one type (`SERVICE`, `HOST`, `KUBERNETES_CLUSTER`).
    async fn entities(&self, entity_type: &str) -> PulseResult<Vec<Entity>>;

    /// Response time, error rate, request count and CPU time of a service.
    async fn service_metrics(&self, service_id: &str) -> PulseResult<MetricBundle>;

    async fn infrastructure_metrics(&self) -> PulseResult<MetricBundle>;

    /// Database call count and time, one result group per metric.
    async fn database_metrics(&self) -> PulseResult<MetricSeries>;

    async fn kubernetes_metrics(&self) -> PulseResult<MetricBundle>;

    /// Open problems only.
    async fn problems(&self) -> PulseResult<Vec<Problem>>;

    async fn network_metrics(&self) -> PulseResult<MetricSeries>;

    async fn synthetic_monitors(&self) -> PulseResult<Vec<SyntheticMonitor>>;

    /// Connectivity probe. Never fails; failure is a `disconnected` state.
    async fn health_check(&self) -> ProviderHealth;
}
