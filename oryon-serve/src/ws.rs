//! WebSocket chat relay on `/ws`
//!
//! Each text frame is a JSON object. `{"type":"chat","message":..,"mode":..}`
//! gets a `chat.reply` or `chat.error` frame back; any other object type is
//! ignored. Relayed chats are not written to the run-log.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use oryon_core::Mode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{AppState, Operator};

#[derive(Debug, Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

/// Frames sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "chat.reply")]
    ChatReply { reply: String },
    #[serde(rename = "chat.error")]
    ChatError { error: String },
    #[serde(rename = "error")]
    Error { error: String },
}

/// Handle one inbound text frame, returning the frame to send back if any
pub async fn handle_frame(operator: &Operator, text: &str) -> Option<ServerFrame> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            return Some(ServerFrame::Error {
                error: "invalid_json".to_string(),
            })
        }
    };

    if value.get("type").and_then(Value::as_str) != Some("chat") {
        return None;
    }

    let frame: ChatFrame = serde_json::from_value(value).unwrap_or(ChatFrame {
        message: None,
        mode: None,
    });
    let Some(message) = frame.message.filter(|m| !m.is_empty()) else {
        return Some(ServerFrame::ChatError {
            error: "message missing".to_string(),
        });
    };
    let mode = Mode::from_request(frame.mode.as_deref());

    Some(match operator.chat_unrecorded(&message, mode).await {
        Ok(reply) => ServerFrame::ChatReply { reply },
        Err(error) => ServerFrame::ChatError { error },
    })
}

pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state))
}

async fn relay(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "WebSocket receive failed");
                break;
            }
        };

        let Some(reply) = handle_frame(&state.operator, text.as_str()).await else {
            continue;
        };

        let payload = match serde_json::to_string(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode WebSocket frame");
                continue;
            }
        };

        if socket.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }

    debug!("WebSocket client disconnected");
}
