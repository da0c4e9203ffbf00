//! Request middleware: body size limit and the webhook shared secret.

use crate::webhook::TOKEN_HEADER;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use pulse_shared::rpc::ErrorBody;
use pulse_shared::PulseError;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Maximum body size: 1 MiB
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Digest of the configured webhook secret.
#[derive(Clone)]
pub struct WebhookAuth {
    expected: Vec<u8>,
}

impl WebhookAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            expected: Sha256::digest(secret.as_bytes()).to_vec(),
        }
    }

    /// Compare digests so the check takes the same time for any candidate.
    pub fn verify(&self, candidate: &str) -> bool {
        let actual = Sha256::digest(candidate.as_bytes());
        actual
            .iter()
            .zip(self.expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Reject webhook calls without the right `x-pulse-token` before any
/// processing happens.
pub async fn require_webhook_token(
    State(auth): State<WebhookAuth>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match token {
        Some(token) if auth.verify(token) => next.run(request).await,
        _ => {
            warn!(
                "[HOOK] Unauthorized webhook attempt ({} header)",
                if token.is_some() { "bad" } else { "missing" }
            );
            let err = PulseError::Unauthorized;
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
            (status, Json(ErrorBody::new(err.public_reason()))).into_response()
        }
    }
}

/// Body size limit middleware
///
/// Checks Content-Length header and rejects requests exceeding MAX_BODY_SIZE
pub async fn body_size_limit(request: Request, next: Next) -> Result<Response, StatusCode> {
    if let Some(length) = request
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if length > MAX_BODY_SIZE {
            warn!(
                "Request body too large: {} bytes (max: {})",
                length, MAX_BODY_SIZE
            );
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_secret() {
        let auth = WebhookAuth::new("pulse-webhook");
        assert!(auth.verify("pulse-webhook"));
        assert!(!auth.verify("pulse-webhook "));
        assert!(!auth.verify(""));
    }
}
