//! API routes for pulsed

use crate::fixture;
use crate::live;
use crate::middleware::{require_webhook_token, WebhookAuth};
use crate::server::AppState;
use crate::setup;
use crate::webhook::{self, WEBHOOK_PATH};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use pulse_shared::event::{Event, EventKind};
use pulse_shared::rpc::{
    ChatRequest, ChatResponse, ClearHistoryResponse, ErrorBody, EventsResponse, HealthResponse,
    HistoryResponse, ProviderHealth, SetupStatus, SetupValidation, WebhookAck,
};
use pulse_shared::snapshot::{DetailedAnalysis, Domain, HealthSnapshot};
use pulse_shared::{PulseError, VERSION};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

type AppStateArc = Arc<AppState>;

type ApiError = (StatusCode, Json<ErrorBody>);

const DEFAULT_EVENTS_LIMIT: usize = 20;
const DEFAULT_TYPED_EVENTS_LIMIT: usize = 10;

fn api_error(err: PulseError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::new(err.public_reason())))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    warn!("[GW] Rejected request body: {}", rejection);
    api_error(PulseError::Validation(format!(
        "Invalid JSON body: {}",
        rejection.body_text()
    )))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Webhook Routes
// ============================================================================

/// `limit` is taken as text so a malformed value falls back to the default.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

impl LimitQuery {
    fn limit_or(&self, default: usize) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(default)
    }
}

pub fn webhook_routes(secret: &str) -> Router<AppStateArc> {
    let receive = Router::new()
        .route(WEBHOOK_PATH, post(receive_webhook))
        .route_layer(axum::middleware::from_fn_with_state(
            WebhookAuth::new(secret),
            require_webhook_token,
        ));

    Router::new()
        .merge(receive)
        .route("/api/webhooks/events", get(recent_events))
        .route("/api/webhooks/events/:type", get(events_by_type))
        .route("/api/webhooks/event/:id", get(event_by_id))
        .route("/api/webhooks/config", get(webhook_config))
}

async fn receive_webhook(
    State(state): State<AppStateArc>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<WebhookAck>, ApiError> {
    let Json(raw) = body.map_err(bad_body)?;
    let event = webhook::ingest(raw, &state.events, &state.broadcaster);
    state.metrics.record_webhook(event.kind().as_str());

    Ok(Json(WebhookAck {
        success: true,
        event_id: event.id,
        message: "Webhook processed successfully".to_string(),
    }))
}

async fn recent_events(
    State(state): State<AppStateArc>,
    Query(query): Query<LimitQuery>,
) -> Json<EventsResponse> {
    let limit = query.limit_or(DEFAULT_EVENTS_LIMIT);
    let mut events = state.events.recent(limit);
    if events.is_empty() && state.aggregator.is_demo() {
        events = fixture::demo_events();
        events.truncate(limit);
    }
    Json(EventsResponse { events })
}

async fn events_by_type(
    State(state): State<AppStateArc>,
    Path(kind): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let kind = EventKind::parse(&kind).ok_or_else(|| {
        api_error(PulseError::Validation(format!("Unknown event type: {}", kind)))
    })?;
    let limit = query.limit_or(DEFAULT_TYPED_EVENTS_LIMIT);
    Ok(Json(EventsResponse {
        events: state.events.by_type(kind, limit),
    }))
}

async fn event_by_id(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    state.events.get(&id).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!("Event '{}' not found", id))),
        )
    })
}

async fn webhook_config(State(state): State<AppStateArc>, headers: HeaderMap) -> Json<Value> {
    let base_url = match &state.config.server.public_url {
        Some(url) => url.clone(),
        None => match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
            Some(host) => format!("http://{}", host),
            None => format!("http://{}", state.config.listen_addr()),
        },
    };
    Json(webhook::webhook_template(&base_url, &state.config.webhook.secret))
}

// ============================================================================
// Chat Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/chat/message", post(chat_message))
        .route(
            "/api/chat/history/:session_id",
            get(chat_history).delete(clear_history),
        )
}

async fn chat_message(
    State(state): State<AppStateArc>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(bad_body)?;
    let message = request
        .text()
        .ok_or_else(|| api_error(PulseError::Validation("Message is required".to_string())))?;
    Ok(Json(state.chat.process(message, request.session()).await))
}

async fn chat_history(
    State(state): State<AppStateArc>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let history = state.chat.conversations().history(&session_id);
    Json(HistoryResponse {
        session_id,
        history,
    })
}

async fn clear_history(
    State(state): State<AppStateArc>,
    Path(session_id): Path<String>,
) -> Json<ClearHistoryResponse> {
    let cleared = state.chat.conversations().clear(&session_id);
    info!("[CHAT] Cleared history for {} (existed: {})", session_id, cleared);
    Json(ClearHistoryResponse {
        session_id,
        cleared,
    })
}

// ============================================================================
// Dashboard Routes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub component: Option<String>,
}

pub fn dashboard_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/dashboard/overview", get(overview))
        .route("/api/dashboard/analysis", get(analysis))
        .route("/api/dashboard/metrics/realtime", get(realtime))
}

async fn overview(State(state): State<AppStateArc>) -> Json<HealthSnapshot> {
    let snapshot = state.aggregator.generate_health_report().await;
    state.broadcaster.publish_snapshot(&snapshot);
    Json(snapshot)
}

async fn analysis(State(state): State<AppStateArc>) -> Json<DetailedAnalysis> {
    Json(state.aggregator.generate_detailed_analysis().await)
}

/// One component when `component` names a domain, the full snapshot otherwise.
async fn realtime(
    State(state): State<AppStateArc>,
    Query(query): Query<RealtimeQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = match query.component.as_deref().and_then(Domain::parse) {
        Some(domain) => serde_json::to_value(state.aggregator.analyze_component(domain).await),
        None => serde_json::to_value(state.aggregator.generate_health_report().await),
    };
    value
        .map(Json)
        .map_err(|e| api_error(PulseError::from(e)))
}

// ============================================================================
// Provider Routes
// ============================================================================

pub fn provider_routes() -> Router<AppStateArc> {
    Router::new().route("/api/provider/health", get(provider_health))
}

async fn provider_health(State(state): State<AppStateArc>) -> Json<ProviderHealth> {
    Json(state.aggregator.provider_health().await)
}

// ============================================================================
// Setup Routes
// ============================================================================

pub fn setup_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/setup/status", get(setup_status))
        .route("/api/setup/validate", get(setup_validate))
        .route("/api/setup/test-connection", post(test_connection))
}

async fn setup_status(State(state): State<AppStateArc>) -> Json<SetupStatus> {
    Json(setup::setup_status(&state.config, &state.aggregator).await)
}

async fn setup_validate(State(state): State<AppStateArc>) -> Json<SetupValidation> {
    Json(setup::validate_configuration(&state.config, &state.aggregator).await)
}

async fn test_connection(State(state): State<AppStateArc>) -> Json<ProviderHealth> {
    let health = state.aggregator.provider_health().await;
    info!("[SETUP] Connection test: {:?}", health.status);
    Json(health)
}

// ============================================================================
// Metrics Routes
// ============================================================================

pub fn metrics_routes() -> Router<AppStateArc> {
    Router::new().route("/metrics", get(metrics))
}

async fn metrics(State(state): State<AppStateArc>) -> Result<impl IntoResponse, ApiError> {
    let text = state.metrics.export().map_err(api_error)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    ))
}

// ============================================================================
// Live Routes
// ============================================================================

pub fn live_routes() -> Router<AppStateArc> {
    Router::new().route("/ws", get(live::ws_handler))
}
