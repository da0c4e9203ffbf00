//! Live channel: WebSocket clients receive broadcast frames and may ask
//! chat questions over the same socket.

use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use pulse_shared::rpc::{ClientMessage, LiveMessage};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Replies to this client's own chat questions.
const REPLY_BUFFER: usize = 16;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut general = state.broadcaster.subscribe();
    let mut urgent = state.broadcaster.subscribe_urgent();
    let (reply_tx, mut reply_rx) = mpsc::channel::<LiveMessage>(REPLY_BUFFER);

    state.metrics.client_connected();
    info!(
        "[LIVE] Client connected ({} subscribers)",
        state.broadcaster.subscriber_count()
    );

    loop {
        let outbound = tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_client_text(&text, &state, &reply_tx);
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!("[LIVE] Socket error: {}", e);
                    break;
                }
            },
            frame = general.recv() => match next_frame(frame) {
                Frame::Send(message) => message,
                Frame::Skip => continue,
                Frame::Closed => break,
            },
            frame = urgent.recv() => match next_frame(frame) {
                Frame::Send(message) => message,
                Frame::Skip => continue,
                Frame::Closed => break,
            },
            Some(reply) = reply_rx.recv() => Arc::new(reply),
        };

        let text = match serde_json::to_string(outbound.as_ref()) {
            Ok(text) => text,
            Err(e) => {
                warn!("[LIVE] Failed to encode {}: {}", outbound.name(), e);
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    state.metrics.client_disconnected();
    info!("[LIVE] Client disconnected");
}

enum Frame {
    Send(Arc<LiveMessage>),
    Skip,
    Closed,
}

fn next_frame(result: Result<Arc<LiveMessage>, broadcast::error::RecvError>) -> Frame {
    match result {
        Ok(message) => Frame::Send(message),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
            warn!("[LIVE] Client lagged, dropped {} frames", missed);
            Frame::Skip
        }
        Err(broadcast::error::RecvError::Closed) => Frame::Closed,
    }
}

/// Parse one client frame and answer chat questions off the socket loop.
fn handle_client_text(text: &str, state: &Arc<AppState>, replies: &mpsc::Sender<LiveMessage>) {
    let request = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::ChatMessage(request)) => request,
        Err(e) => {
            debug!("[LIVE] Ignoring unrecognized frame: {}", e);
            return;
        }
    };

    let Some(message) = request.text().map(str::to_string) else {
        if let Err(e) = replies.try_send(LiveMessage::ChatError {
            error: "Message is required".to_string(),
        }) {
            debug!("[LIVE] Dropped chat_error reply: {}", e);
        }
        return;
    };

    let session = request.session().to_string();
    let chat = state.chat.clone();
    let replies = replies.clone();
    tokio::spawn(async move {
        let response = chat.process(&message, &session).await;
        let reply = if response.error {
            LiveMessage::ChatError {
                error: response.message,
            }
        } else {
            LiveMessage::ChatResponse(response)
        };
        // Receiver gone means the client left
        let _ = replies.send(reply).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lagged_frames_are_skipped() {
        assert!(matches!(
            next_frame(Err(broadcast::error::RecvError::Lagged(3))),
            Frame::Skip
        ));
        assert!(matches!(
            next_frame(Err(broadcast::error::RecvError::Closed)),
            Frame::Closed
        ));
    }

    #[tokio::test]
    async fn test_blank_chat_frame_gets_error() {
        let state = Arc::new(AppState::demo(crate::config::Config::default()).unwrap());
        let (tx, mut rx) = mpsc::channel(4);
        handle_client_text(
            r#"{"event":"chat_message","data":{"message":"   "}}"#,
            &state,
            &tx,
        );
        match rx.recv().await {
            Some(LiveMessage::ChatError { error }) => assert_eq!(error, "Message is required"),
            other => panic!("unexpected reply: {:?}", other.map(|m| m.name())),
        }
    }

    #[tokio::test]
    async fn test_chat_frame_gets_response() {
        let state = Arc::new(AppState::demo(crate::config::Config::default()).unwrap());
        let (tx, mut rx) = mpsc::channel(4);
        handle_client_text(
            r#"{"event":"chat_message","data":{"message":"which application is down","sessionId":"ws"}}"#,
            &state,
            &tx,
        );
        match rx.recv().await {
            Some(LiveMessage::ChatResponse(response)) => {
                assert!(response.message.contains("Email Service"))
            }
            other => panic!("unexpected reply: {:?}", other.map(|m| m.name())),
        }
    }

    #[tokio::test]
    async fn test_blank_chat_frame_with_full_queue_is_dropped() {
        let state = Arc::new(AppState::demo(crate::config::Config::default()).unwrap());
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(LiveMessage::ChatError {
            error: "queued".to_string(),
        })
        .unwrap();
        handle_client_text(r#"{"event":"chat_message","data":{}}"#, &state, &tx);

        match rx.try_recv() {
            Ok(LiveMessage::ChatError { error }) => assert_eq!(error, "queued"),
            other => panic!("unexpected reply: {:?}", other.map(|m| m.name())),
        }
        assert!(rx.try_recv().is_err());
    }
}
