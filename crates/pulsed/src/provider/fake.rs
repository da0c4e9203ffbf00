//! Scripted in-memory gateway for deterministic tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! let fake = FakeGateway::new()
//!     .with_entities("SERVICE", vec![Entity::new("SERVICE-1", "checkout")])
//!     .with_service_metrics("SERVICE-1", bundle)
//!     .failing("problems");
//! ```
//!
//! Operation keys for `failing`: `entities:<TYPE>`, `service_metrics:<id>`,
//! `infrastructure`, `databases`, `kubernetes`, `problems`, `network`,
//! `synthetic`, `health`.

use super::{Entity, MetricBundle, MetricSeries, MetricsGateway, Problem, SyntheticMonitor};
use async_trait::async_trait;
use pulse_shared::rpc::{ProviderHealth, ProviderState};
use pulse_shared::{PulseError, PulseResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct FakeGateway {
    entities: HashMap<String, Vec<Entity>>,
    service_metrics: HashMap<String, MetricBundle>,
    infrastructure: MetricBundle,
    database: MetricSeries,
    kubernetes: MetricBundle,
    problems: Vec<Problem>,
    network: MetricSeries,
    monitors: Vec<SyntheticMonitor>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    /// Track call counts for assertions
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(mut self, entity_type: &str, entities: Vec<Entity>) -> Self {
        self.entities.insert(entity_type.to_string(), entities);
        self
    }

    pub fn with_service_metrics(mut self, service_id: &str, bundle: MetricBundle) -> Self {
        self.service_metrics.insert(service_id.to_string(), bundle);
        self
    }

    pub fn with_infrastructure(mut self, bundle: MetricBundle) -> Self {
        self.infrastructure = bundle;
        self
    }

    pub fn with_database_metrics(mut self, series: MetricSeries) -> Self {
        self.database = series;
        self
    }

    pub fn with_kubernetes(mut self, bundle: MetricBundle) -> Self {
        self.kubernetes = bundle;
        self
    }

    pub fn with_problems(mut self, problems: Vec<Problem>) -> Self {
        self.problems = problems;
        self
    }

    pub fn with_network(mut self, series: MetricSeries) -> Self {
        self.network = series;
        self
    }

    pub fn with_monitors(mut self, monitors: Vec<SyntheticMonitor>) -> Self {
        self.monitors = monitors;
        self
    }

    /// Make an operation fail with an upstream error.
    pub fn failing(mut self, op: &str) -> Self {
        self.failing.insert(op.to_string());
        self
    }

    /// Make an operation panic, to exercise task-level fallbacks.
    pub fn panicking(mut self, op: &str) -> Self {
        self.panicking.insert(op.to_string());
        self
    }

    /// Delay every call, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    async fn enter(&self, op: &str) -> PulseResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(op.to_string()).or_insert(0) += 1;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(op) {
            panic!("scripted panic in {}", op);
        }
        if self.failing.contains(op) {
            return Err(PulseError::Upstream(format!("scripted failure in {}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsGateway for FakeGateway {
    async fn entities(&self, entity_type: &str) -> PulseResult<Vec<Entity>> {
        self.enter(&format!("entities:{}", entity_type)).await?;
        Ok(self.entities.get(entity_type).cloned().unwrap_or_default())
    }

    async fn service_metrics(&self, service_id: &str) -> PulseResult<MetricBundle> {
        self.enter(&format!("service_metrics:{}", service_id)).await?;
        Ok(self
            .service_metrics
            .get(service_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn infrastructure_metrics(&self) -> PulseResult<MetricBundle> {
        self.enter("infrastructure").await?;
        Ok(self.infrastructure.clone())
    }

    async fn database_metrics(&self) -> PulseResult<MetricSeries> {
        self.enter("databases").await?;
        Ok(self.database.clone())
    }

    async fn kubernetes_metrics(&self) -> PulseResult<MetricBundle> {
        self.enter("kubernetes").await?;
        Ok(self.kubernetes.clone())
    }

    async fn problems(&self) -> PulseResult<Vec<Problem>> {
        self.enter("problems").await?;
        Ok(self.problems.clone())
    }

    async fn network_metrics(&self) -> PulseResult<MetricSeries> {
        self.enter("network").await?;
        Ok(self.network.clone())
    }

    async fn synthetic_monitors(&self) -> PulseResult<Vec<SyntheticMonitor>> {
        self.enter("synthetic").await?;
        Ok(self.monitors.clone())
    }

    async fn health_check(&self) -> ProviderHealth {
        match self.enter("health").await {
            Ok(()) => {
                let mut health = ProviderHealth::new(ProviderState::Connected);
                health.version = Some("fake-1.0".to_string());
                health
            }
            Err(e) => {
                let mut health = ProviderHealth::new(ProviderState::Disconnected);
                health.error = Some(e.public_reason());
                health
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses() {
        let fake = FakeGateway::new()
            .with_entities("HOST", vec![Entity::new("HOST-1", "web-01")])
            .failing("problems");

        let hosts = fake.entities("HOST").await.unwrap();
        assert_eq!(hosts[0].label(), "web-01");
        assert!(fake.entities("SERVICE").await.unwrap().is_empty());
        assert!(matches!(fake.problems().await, Err(PulseError::Upstream(_))));
        assert_eq!(fake.call_count("entities:HOST"), 1);
        assert_eq!(fake.call_count("problems"), 1);
    }

    #[tokio::test]
    async fn test_health_states() {
        let ok = FakeGateway::new().health_check().await;
        assert_eq!(ok.status, ProviderState::Connected);
        let down = FakeGateway::new().failing("health").health_check().await;
        assert_eq!(down.status, ProviderState::Disconnected);
    }
}
