//! Prometheus metrics for the aggregator and its inbound surfaces.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, Encoder, HistogramVec, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use pulse_shared::{PulseError, PulseResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct PulseMetrics {
    pub webhooks_total: IntCounterVec,
    pub aggregations_total: IntCounterVec,
    pub chat_messages_total: IntCounterVec,
    pub live_clients: IntGauge,
    pub aggregation_seconds: HistogramVec,

    registry: Arc<Registry>,
}

impl PulseMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let webhooks_total = register_int_counter_vec_with_registry!(
            "pulse_webhooks_total",
            "Webhook notifications accepted, by normalized event type",
            &["type"],
            registry
        )?;

        let aggregations_total = register_int_counter_vec_with_registry!(
            "pulse_aggregations_total",
            "Health snapshots produced, by data source",
            &["source"],
            registry
        )?;

        let chat_messages_total = register_int_counter_vec_with_registry!(
            "pulse_chat_messages_total",
            "Chat queries answered, by classified intent",
            &["intent"],
            registry
        )?;

        let live_clients = register_int_gauge_with_registry!(
            "pulse_live_clients",
            "Currently connected live-channel clients",
            registry
        )?;

        let aggregation_seconds = register_histogram_vec_with_registry!(
            "pulse_aggregation_seconds",
            "Wall time of one health aggregation",
            &["source"],
            vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
            registry
        )?;

        Ok(Self {
            webhooks_total,
            aggregations_total,
            chat_messages_total,
            live_clients,
            aggregation_seconds,
            registry: Arc::new(registry),
        })
    }

    pub fn record_webhook(&self, event_type: &str) {
        self.webhooks_total.with_label_values(&[event_type]).inc();
    }

    /// Record one finished aggregation and how long it took
    pub fn record_aggregation(&self, source: &str, duration_secs: f64) {
        self.aggregations_total.with_label_values(&[source]).inc();
        self.aggregation_seconds
            .with_label_values(&[source])
            .observe(duration_secs);
    }

    pub fn record_chat(&self, intent: &str) {
        self.chat_messages_total.with_label_values(&[intent]).inc();
    }

    pub fn client_connected(&self) {
        self.live_clients.inc();
    }

    pub fn client_disconnected(&self) {
        self.live_clients.dec();
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> PulseResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| PulseError::Internal(format!("metrics encoding failed: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| PulseError::Internal(format!("metrics are not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = PulseMetrics::new().unwrap();
        metrics.record_webhook("problem");
        metrics.record_webhook("problem");
        metrics.record_aggregation("demo", 0.2);
        metrics.client_connected();

        let text = metrics.export().unwrap();
        assert!(text.contains("pulse_webhooks_total{type=\"problem\"} 2"));
        assert!(text.contains("pulse_aggregations_total{source=\"demo\"} 1"));
        assert!(text.contains("pulse_live_clients 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = PulseMetrics::new().unwrap();
        let b = PulseMetrics::new().unwrap();
        a.record_chat("help");
        assert!(!b.export().unwrap().contains("intent=\"help\""));
    }
}
