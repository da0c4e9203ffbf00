//! Health aggregation: runs the domain analyzers, rolls their reports up
//! into one snapshot, and owns the demo fallback.
//!
//! The data source is picked once at startup. Live aggregation runs in its
//! own task under a timeout; a panic or a timeout yields the fixture
//! snapshot, so `generate_health_report` never fails.

use crate::analyzers::{ComponentAnalyzer, CPU_USAGE, MEMORY_USAGE, RESPONSE_TIME};
use crate::config::ProviderConfig;
use crate::fixture;
use crate::metrics::PulseMetrics;
use crate::provider::{DynatraceGateway, MetricsGateway};
use pulse_shared::rpc::{ProviderHealth, ProviderState};
use pulse_shared::snapshot::{
    AnalysisNote, ComponentReport, DetailedAnalysis, Domain, HealthSnapshot, Insight, InsightKind,
    SnapshotSource,
};
use pulse_shared::thresholds::{MetricKind, ThresholdSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const TRENDS_UNAVAILABLE: &str = "Trend analysis requires historical data collection";
const PREDICTIONS_UNAVAILABLE: &str = "Predictive analysis requires machine learning models";

/// Where snapshots come from.
#[derive(Clone)]
pub enum DataSource {
    Live(Arc<dyn MetricsGateway>),
    Fixture,
}

impl DataSource {
    /// Live when the provider is configured and a client can be built,
    /// fixture otherwise.
    pub fn select(config: &ProviderConfig) -> Self {
        if config.is_demo() {
            info!("[AGG] No provider configured, serving demo data");
            return DataSource::Fixture;
        }
        match DynatraceGateway::new(config) {
            Ok(gateway) => {
                info!("[AGG] Using provider at {}", gateway.base_url());
                DataSource::Live(Arc::new(gateway))
            }
            Err(e) => {
                warn!("[AGG] Provider client unavailable ({}), serving demo data", e);
                DataSource::Fixture
            }
        }
    }

    pub fn is_fixture(&self) -> bool {
        matches!(self, DataSource::Fixture)
    }
}

pub struct HealthAggregator {
    source: DataSource,
    thresholds: ThresholdSet,
    service_limit: usize,
    timeout: Duration,
    metrics: Option<Arc<PulseMetrics>>,
    latest: RwLock<Option<HealthSnapshot>>,
}

impl HealthAggregator {
    pub fn new(source: DataSource, thresholds: ThresholdSet, config: &ProviderConfig) -> Self {
        Self {
            source,
            thresholds,
            service_limit: config.service_limit,
            timeout: config.aggregation_timeout(),
            metrics: None,
            latest: RwLock::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PulseMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_demo(&self) -> bool {
        self.source.is_fixture()
    }

    /// Build a fresh snapshot and remember it as the latest one.
    pub async fn generate_health_report(&self) -> HealthSnapshot {
        let started = Instant::now();
        let snapshot = match &self.source {
            DataSource::Fixture => fixture::demo_snapshot(&self.thresholds),
            DataSource::Live(gateway) => self.live_snapshot(Arc::clone(gateway)).await,
        };

        let source = match snapshot.source {
            SnapshotSource::Live => "live",
            SnapshotSource::Demo => "demo",
        };
        if let Some(ref metrics) = self.metrics {
            metrics.record_aggregation(source, started.elapsed().as_secs_f64());
        }
        info!(
            "[AGG] Health report: {} ({} source, {}ms)",
            snapshot.overall_health.as_str(),
            source,
            started.elapsed().as_millis()
        );

        *self.latest.write().await = Some(snapshot.clone());
        snapshot
    }

    async fn live_snapshot(&self, gateway: Arc<dyn MetricsGateway>) -> HealthSnapshot {
        let analyzer = ComponentAnalyzer::new(gateway, self.thresholds.clone(), self.service_limit);
        let mut handle = tokio::spawn(async move { analyzer.analyze_all().await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(components)) => HealthSnapshot::assemble(components, SnapshotSource::Live),
            Ok(Err(e)) => {
                error!("[AGG] Aggregation task failed: {}, falling back to demo data", e);
                fixture::demo_snapshot(&self.thresholds)
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "[AGG] Aggregation exceeded {}s, falling back to demo data",
                    self.timeout.as_secs()
                );
                fixture::demo_snapshot(&self.thresholds)
            }
        }
    }

    /// Most recent snapshot, if any cycle has completed.
    pub async fn latest(&self) -> Option<HealthSnapshot> {
        self.latest.read().await.clone()
    }

    pub async fn latest_or_generate(&self) -> HealthSnapshot {
        if let Some(snapshot) = self.latest().await {
            return snapshot;
        }
        self.generate_health_report().await
    }

    /// Fresh snapshot plus derived insights.
    pub async fn generate_detailed_analysis(&self) -> DetailedAnalysis {
        let snapshot = self.generate_health_report().await;
        let insights = insights_for(&snapshot, &self.thresholds);
        DetailedAnalysis {
            snapshot,
            insights,
            trends: AnalysisNote {
                message: TRENDS_UNAVAILABLE.to_string(),
            },
            predictions: AnalysisNote {
                message: PREDICTIONS_UNAVAILABLE.to_string(),
            },
        }
    }

    /// One domain on its own, for the realtime endpoint.
    pub async fn analyze_component(&self, domain: Domain) -> ComponentReport {
        let gateway = match &self.source {
            DataSource::Fixture => {
                return fixture::demo_snapshot(&self.thresholds)
                    .component(domain)
                    .cloned()
                    .unwrap_or_else(|| ComponentReport::failed("No demo data for component"));
            }
            DataSource::Live(gateway) => Arc::clone(gateway),
        };

        let analyzer = ComponentAnalyzer::new(gateway, self.thresholds.clone(), self.service_limit);
        let mut handle = tokio::spawn(async move { analyzer.analyze(domain).await });
        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!("[AGG] {} analysis task failed: {}", domain, e);
                ComponentReport::failed("Analysis failed")
            }
            Err(_) => {
                handle.abort();
                warn!("[AGG] {} analysis timed out", domain);
                ComponentReport::failed("Analysis timed out")
            }
        }
    }

    pub async fn provider_health(&self) -> ProviderHealth {
        match &self.source {
            DataSource::Fixture => ProviderHealth::new(ProviderState::Demo),
            DataSource::Live(gateway) => gateway.health_check().await,
        }
    }
}

/// Slow services and hot hosts, measured against the warning thresholds.
pub fn insights_for(snapshot: &HealthSnapshot, thresholds: &ThresholdSet) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Ok(limit) = thresholds.get(MetricKind::ResponseTime) {
        let slow: Vec<String> = snapshot
            .items(Domain::Services)
            .iter()
            .filter(|s| s.metric(RESPONSE_TIME).unwrap_or(0.0) > limit.warning)
            .map(|s| s.name.clone())
            .collect();
        if !slow.is_empty() {
            insights.push(Insight {
                kind: InsightKind::Performance,
                message: format!("{} services have elevated response times", slow.len()),
                subjects: slow,
            });
        }
    }

    let cpu = thresholds.get(MetricKind::Cpu).ok();
    let memory = thresholds.get(MetricKind::Memory).ok();
    let hot: Vec<String> = snapshot
        .items(Domain::Infrastructure)
        .iter()
        .filter(|h| {
            let over = |key: &str, limit: Option<f64>| match limit {
                Some(limit) => h.metric(key).unwrap_or(0.0) > limit,
                None => false,
            };
            over(CPU_USAGE, cpu.map(|t| t.warning)) || over(MEMORY_USAGE, memory.map(|t| t.warning))
        })
        .map(|h| h.name.clone())
        .collect();
    if !hot.is_empty() {
        insights.push(Insight {
            kind: InsightKind::Capacity,
            message: format!("{} hosts are running hot on CPU or memory", hot.len()),
            subjects: hot,
        });
    }

    insights
}
