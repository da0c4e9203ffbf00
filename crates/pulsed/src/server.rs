//! HTTP server for pulsed

use crate::aggregator::{DataSource, HealthAggregator};
use crate::broadcaster::Broadcaster;
use crate::chat::ChatService;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::event_store::EventStore;
use crate::metrics::PulseMetrics;
use crate::middleware;
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub aggregator: Arc<HealthAggregator>,
    pub chat: ChatService,
    pub events: Arc<EventStore>,
    pub broadcaster: Broadcaster,
    pub metrics: Arc<PulseMetrics>,
}

impl AppState {
    pub fn new(config: Config, source: DataSource) -> Result<Self> {
        let metrics = Arc::new(PulseMetrics::new().context("registering metrics")?);
        let aggregator = Arc::new(
            HealthAggregator::new(source, config.thresholds(), &config.provider)
                .with_metrics(Arc::clone(&metrics)),
        );
        let conversations = Arc::new(ConversationStore::new(config.chat.history_limit));
        let chat = ChatService::new(Arc::clone(&aggregator), conversations)
            .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            events: Arc::new(EventStore::new(config.webhook.max_stored_events)),
            broadcaster: Broadcaster::default(),
            aggregator,
            chat,
            metrics,
            config,
        })
    }

    /// State over the demo fixture, whatever the provider settings say.
    pub fn demo(config: Config) -> Result<Self> {
        Self::new(config, DataSource::Fixture)
    }
}

/// Full application router
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::webhook_routes(&state.config.webhook.secret))
        .merge(routes::chat_routes())
        .merge(routes::dashboard_routes())
        .merge(routes::provider_routes())
        .merge(routes::setup_routes())
        .merge(routes::metrics_routes())
        .merge(routes::live_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::body_size_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.listen_addr();
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("[GW] Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
