//! REST client for the Dynatrace API with timeout and retry.

use super::{
    Entity, EntityList, MetricBundle, MetricSeries, MetricsGateway, MonitorList, Problem,
    ProblemList, SyntheticMonitor, DATABASE_METRICS, HOST_METRICS, KUBERNETES_METRICS,
    NETWORK_METRICS, SERVICE_METRICS,
};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use pulse_shared::rpc::{ProviderHealth, ProviderState};
use pulse_shared::{PulseError, PulseResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Query window for every metric request.
const TIMEFRAME: &str = "now-2h";

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub factor: f64,
    pub jitter_percent: f64,
    pub max_ms: u64,
    pub max_attempts: usize,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 200,
            factor: 2.0,
            jitter_percent: 0.20,
            max_ms: 5000,
            max_attempts: 3,
        }
    }
}

impl BackoffConfig {
    /// Calculate backoff duration with jitter
    pub fn calculate_backoff(&self, attempt: usize) -> Duration {
        use rand::Rng;

        let base_backoff =
            (self.base_ms as f64 * self.factor.powi(attempt as i32)).min(self.max_ms as f64);

        // ±jitter_percent
        let mut rng = rand::thread_rng();
        let jitter_range = base_backoff * self.jitter_percent;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        let backoff_ms = (base_backoff + jitter).max(0.0) as u64;
        Duration::from_millis(backoff_ms)
    }
}

/// Request result classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    NetworkError,
    Http4xx,
    Http5xx,
    Timeout,
    Decode,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NetworkError => "network_error",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::Timeout => "timeout",
            Self::Decode => "decode_error",
        }
    }

    /// Determine if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Http5xx | Self::Timeout)
    }

    fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode
        } else if let Some(status) = err.status() {
            if status.is_client_error() {
                Self::Http4xx
            } else {
                Self::Http5xx
            }
        } else {
            Self::NetworkError
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClusterVersion {
    #[serde(default)]
    version: String,
}

/// Live gateway. Cheap to clone: the reqwest client is shared.
#[derive(Clone)]
pub struct DynatraceGateway {
    client: reqwest::Client,
    base_url: String,
    backoff: BackoffConfig,
}

impl DynatraceGateway {
    pub fn new(config: &ProviderConfig) -> PulseResult<Self> {
        if config.is_demo() {
            return Err(PulseError::Configuration(
                "provider URL is missing or a placeholder".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Api-Token {}", config.api_token))
            .map_err(|e| PulseError::Configuration(format!("invalid API token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PulseError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            backoff: BackoffConfig {
                max_attempts: config.max_attempts.max(1),
                ..BackoffConfig::default()
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET with retry on network errors, 5xx and timeouts.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> PulseResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 0..self.backoff.max_attempts {
            debug!(
                "[GW] GET {} (attempt {}/{})",
                path,
                attempt + 1,
                self.backoff.max_attempts
            );

            let outcome = match self.client.get(&url).query(query).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.json::<T>().await {
                        Ok(body) => return Ok(body),
                        Err(e) => (RequestStatus::classify(&e), e.to_string()),
                    },
                    Err(e) => (RequestStatus::classify(&e), e.to_string()),
                },
                Err(e) => (RequestStatus::classify(&e), e.to_string()),
            };

            let (status, message) = outcome;
            last_error = format!("GET {}: {} ({})", path, message, status.as_str());
            if !status.is_retryable() {
                return Err(PulseError::Upstream(last_error));
            }
            warn!("[GW] {}, retrying...", last_error);

            if attempt + 1 < self.backoff.max_attempts {
                let backoff = self.backoff.calculate_backoff(attempt);
                debug!("[GW] Backing off for {:?} before retry", backoff);
                sleep(backoff).await;
            }
        }

        Err(PulseError::Upstream(format!(
            "{} after {} attempts",
            last_error, self.backoff.max_attempts
        )))
    }

    async fn query_metric(
        &self,
        selector: &str,
        entity_selector: Option<&str>,
    ) -> PulseResult<MetricSeries> {
        let mut query = vec![
            ("metricSelector", selector.to_string()),
            ("from", TIMEFRAME.to_string()),
        ];
        if let Some(entities) = entity_selector {
            query.push(("entitySelector", entities.to_string()));
        }
        self.get_json("/api/v2/metrics/query", &query).await
    }

    /// One query per metric, run concurrently; any failure fails the bundle.
    async fn query_bundle(
        &self,
        metrics: &[&str],
        entity_selector: Option<String>,
    ) -> PulseResult<MetricBundle> {
        let mut set = JoinSet::new();
        for metric in metrics {
            let gateway = self.clone();
            let metric = metric.to_string();
            let entities = entity_selector.clone();
            set.spawn(async move {
                let series = gateway.query_metric(&metric, entities.as_deref()).await;
                (metric, series)
            });
        }

        let mut bundle = MetricBundle::new();
        while let Some(joined) = set.join_next().await {
            let (metric, series) =
                joined.map_err(|e| PulseError::Internal(format!("metric task: {}", e)))?;
            bundle.insert(metric, series?);
        }
        Ok(bundle)
    }
}

#[async_trait]
impl MetricsGateway for DynatraceGateway {
    async fn entities(&self, entity_type: &str) -> PulseResult<Vec<Entity>> {
        let query = [
            ("entitySelector", format!("type(\"{}\")", entity_type)),
            ("fields", "+properties".to_string()),
        ];
        let list: EntityList = self.get_json("/api/v2/entities", &query).await?;
        Ok(list.entities)
    }

    async fn service_metrics(&self, service_id: &str) -> PulseResult<MetricBundle> {
        self.query_bundle(
            &SERVICE_METRICS,
            Some(format!("entityId(\"{}\")", service_id)),
        )
        .await
    }

    async fn infrastructure_metrics(&self) -> PulseResult<MetricBundle> {
        self.query_bundle(&HOST_METRICS, None).await
    }

    async fn database_metrics(&self) -> PulseResult<MetricSeries> {
        self.query_metric(
            &DATABASE_METRICS.join(","),
            Some("type(\"SERVICE\"),databaseVendor.exists()"),
        )
        .await
    }

    async fn kubernetes_metrics(&self) -> PulseResult<MetricBundle> {
        self.query_bundle(&KUBERNETES_METRICS, None).await
    }

    async fn problems(&self) -> PulseResult<Vec<Problem>> {
        let query = [
            ("problemSelector", "status(\"OPEN\")".to_string()),
            (
                "fields",
                "+evidenceDetails,+recentComments,+impactAnalysis".to_string(),
            ),
        ];
        let list: ProblemList = self.get_json("/api/v2/problems", &query).await?;
        Ok(list.problems)
    }

    async fn network_metrics(&self) -> PulseResult<MetricSeries> {
        self.query_metric(&NETWORK_METRICS.join(","), None).await
    }

    async fn synthetic_monitors(&self) -> PulseResult<Vec<SyntheticMonitor>> {
        let query = [("from", TIMEFRAME.to_string())];
        let list: MonitorList = self.get_json("/api/v1/synthetic/monitors", &query).await?;
        Ok(list.monitors)
    }

    async fn health_check(&self) -> ProviderHealth {
        match self
            .get_json::<ClusterVersion>("/api/v1/config/clusterversion", &[])
            .await
        {
            Ok(v) => {
                let mut health = ProviderHealth::new(ProviderState::Connected);
                health.version = Some(v.version);
                health
            }
            Err(e) => {
                warn!("[GW] Health check failed: {}", e);
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

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = BackoffConfig {
            base_ms: 100,
            factor: 2.0,
            jitter_percent: 0.0,
            max_ms: 1000,
            max_attempts: 5,
        };
        assert_eq!(backoff.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(backoff.calculate_backoff(2), Duration::from_millis(400));
        assert_eq!(backoff.calculate_backoff(10), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let backoff = BackoffConfig::default();
        for _ in 0..50 {
            let ms = backoff.calculate_backoff(1).as_millis();
            assert!((320..=480).contains(&ms), "{}", ms);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(RequestStatus::Timeout.is_retryable());
        assert!(RequestStatus::Http5xx.is_retryable());
        assert!(!RequestStatus::Http4xx.is_retryable());
        assert!(!RequestStatus::Decode.is_retryable());
    }

    #[test]
    fn test_demo_config_is_rejected() {
        let config = ProviderConfig::default();
        assert!(matches!(
            DynatraceGateway::new(&config),
            Err(PulseError::Configuration(_))
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let config = ProviderConfig {
            url: "https://abc.live.dynatrace.com/ ".to_string(),
            api_token: "dt0c01.x".to_string(),
            ..ProviderConfig::default()
        };
        let gw = DynatraceGateway::new(&config).unwrap();
        assert_eq!(gw.base_url(), "https://abc.live.dynatrace.com");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream_error() {
        let config = ProviderConfig {
            url: "http://127.0.0.1:9".to_string(),
            api_token: "t".to_string(),
            timeout_secs: 2,
            max_attempts: 1,
            ..ProviderConfig::default()
        };
        let gw = DynatraceGateway::new(&config).unwrap();
        let err = gw.entities("SERVICE").await.unwrap_err();
        assert!(matches!(err, PulseError::Upstream(_)));

        let health = gw.health_check().await;
        assert_eq!(health.status, ProviderState::Disconnected);
    }
}
