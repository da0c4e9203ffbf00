//! Chat pipeline: classify, fetch the latest snapshot, render, remember.

use crate::aggregator::HealthAggregator;
use crate::conversation::ConversationStore;
use crate::metrics::PulseMetrics;
use crate::responder;
use crate::router::classify_query;
use pulse_shared::rpc::ChatResponse;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct ChatService {
    aggregator: Arc<HealthAggregator>,
    conversations: Arc<ConversationStore>,
    metrics: Option<Arc<PulseMetrics>>,
}

impl ChatService {
    pub fn new(aggregator: Arc<HealthAggregator>, conversations: Arc<ConversationStore>) -> Self {
        Self {
            aggregator,
            conversations,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PulseMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Answer one message. Failures become an apology with `error: true`.
    pub async fn process(&self, message: &str, session: &str) -> ChatResponse {
        let intent = classify_query(message);
        info!(
            "[CHAT] session={} intent={} confidence={:.2}",
            session, intent.kind, intent.confidence
        );
        if let Some(ref metrics) = self.metrics {
            metrics.record_chat(intent.kind.as_str());
        }

        let snapshot = self.aggregator.latest_or_generate().await;
        match responder::respond(message, &intent, &snapshot, &self.conversations, session) {
            Ok(reply) => ChatResponse::from_reply(reply),
            Err(e) => {
                error!("[CHAT] Error processing message: {}", e);
                ChatResponse::apology()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DataSource;
    use crate::config::ProviderConfig;
    use pulse_shared::ThresholdSet;

    fn service() -> ChatService {
        let aggregator = HealthAggregator::new(
            DataSource::Fixture,
            ThresholdSet::default(),
            &ProviderConfig::default(),
        );
        ChatService::new(Arc::new(aggregator), Arc::new(ConversationStore::default()))
    }

    #[tokio::test]
    async fn test_process_answers_and_records() {
        let chat = service();
        let response = chat.process("which application is down", "ops").await;
        assert!(!response.error);
        assert!(response.message.contains("Email Service"));
        assert_eq!(chat.conversations().history("ops").len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let chat = service();
        for _ in 0..11 {
            chat.process("hello", "s").await;
        }
        assert_eq!(chat.conversations().history("s").len(), 10);
    }
}
