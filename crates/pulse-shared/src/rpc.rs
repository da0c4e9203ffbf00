//! Request/response types for the HTTP API and the live channel.

use crate::event::Event;
use crate::snapshot::{DetailedAnalysis, HealthSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session used when a chat request names none.
pub const DEFAULT_SESSION: &str = "default";

/// Inbound chat message, over HTTP or the live channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "sessionId", alias = "session_id", default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Trimmed message, `None` when missing or blank.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn session(&self) -> &str {
        self.session_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SESSION)
    }
}

/// What a renderer produces for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ChatReply {
    pub fn text(message: impl Into<String>, suggestions: &[&str]) -> Self {
        Self {
            message: message.into(),
            data: None,
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Chat answer as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl ChatResponse {
    pub fn from_reply(reply: ChatReply) -> Self {
        Self {
            message: reply.message,
            data: reply.data,
            suggestions: reply.suggestions,
            timestamp: Utc::now(),
            error: false,
        }
    }

    /// Apologetic reply used when rendering failed.
    pub fn apology() -> Self {
        Self {
            message: "I'm sorry, I encountered an error while processing your request. \
                      Please try again."
                .to_string(),
            data: None,
            suggestions: Vec::new(),
            timestamp: Utc::now(),
            error: true,
        }
    }
}

/// One remembered exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub session_id: String,
    pub cleared: bool,
}

/// Webhook acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub success: bool,
    pub event_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

/// `{error}` body for 4xx/5xx answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Liveness answer for `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    Connected,
    Disconnected,
    Demo,
}

/// Provider connectivity as seen from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: ProviderState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderHealth {
    pub fn new(status: ProviderState) -> Self {
        Self {
            status,
            version: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of checking the daemon's own configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupValidation {
    /// True when nothing blocks live operation. Warnings do not count.
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub provider: ProviderHealth,
}

/// Effective settings as shown to operators, secrets masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupSettings {
    pub provider_url: Option<String>,
    pub api_token: Option<String>,
    pub webhook_secret: String,
    pub demo_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    pub timestamp: DateTime<Utc>,
    pub configuration: SetupValidation,
    pub settings: SetupSettings,
    pub next_steps: Vec<String>,
}

/// Server-to-client frames on the live channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    HealthUpdate(HealthSnapshot),
    DetailedAnalysis(DetailedAnalysis),
    DynatraceEvent(Event),
    GenericEvent(Event),
    CriticalAlert(Event),
    ChatResponse(ChatResponse),
    ChatError { error: String },
}

impl LiveMessage {
    pub fn name(&self) -> &'static str {
        match self {
            LiveMessage::HealthUpdate(_) => "health_update",
            LiveMessage::DetailedAnalysis(_) => "detailed_analysis",
            LiveMessage::DynatraceEvent(_) => "dynatrace_event",
            LiveMessage::GenericEvent(_) => "generic_event",
            LiveMessage::CriticalAlert(_) => "critical_alert",
            LiveMessage::ChatResponse(_) => "chat_response",
            LiveMessage::ChatError { .. } => "chat_error",
        }
    }
}

/// Client-to-server frames on the live channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    ChatMessage(ChatRequest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"  hi  "}"#).unwrap();
        assert_eq!(req.text(), Some("hi"));
        assert_eq!(req.session(), DEFAULT_SESSION);

        let req: ChatRequest = serde_json::from_str(r#"{"message":"   ","sessionId":"s1"}"#).unwrap();
        assert_eq!(req.text(), None);
        assert_eq!(req.session(), "s1");

        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.text(), None);
    }

    #[test]
    fn test_chat_response_hides_error_flag_when_false() {
        let ok = ChatResponse::from_reply(ChatReply::text("fine", &["next"]));
        let v = serde_json::to_value(&ok).unwrap();
        assert!(v.get("error").is_none());
        assert_eq!(v["suggestions"][0], "next");

        let v = serde_json::to_value(ChatResponse::apology()).unwrap();
        assert_eq!(v["error"], true);
    }

    #[test]
    fn test_client_message_parse() {
        let raw = r#"{"event":"chat_message","data":{"message":"status?","sessionId":"abc"}}"#;
        let ClientMessage::ChatMessage(req) = serde_json::from_str(raw).unwrap();
        assert_eq!(req.text(), Some("status?"));
        assert_eq!(req.session(), "abc");
    }

    #[test]
    fn test_live_message_frame() {
        let msg = LiveMessage::ChatError {
            error: "Message is required".to_string(),
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["event"], "chat_error");
        assert_eq!(v["data"]["error"], "Message is required");
        assert_eq!(msg.name(), "chat_error");
    }

    #[test]
    fn test_webhook_ack_camel_case() {
        let ack = WebhookAck {
            success: true,
            event_id: "P1".to_string(),
            message: "Webhook processed successfully".to_string(),
        };
        let v = serde_json::to_value(ack).unwrap();
        assert_eq!(v["eventId"], "P1");
    }
}
