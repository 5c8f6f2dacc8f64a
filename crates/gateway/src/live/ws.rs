//! WebSocket endpoint for live UI subscribers.
//!
//! Flow:
//! 1. Client connects to `/v1/ws/live` and starts unfiltered.
//! 2. `{"action":"subscribe_trace","trace_id":...}` narrows the session
//!    to one trace; `unsubscribe_trace` widens it back.
//! 3. Invalid JSON gets `{"error":"Invalid JSON"}` without disconnecting.
//! 4. Disconnect (or any send failure) removes the session everywhere.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    SubscribeTrace { trace_id: String },
    UnsubscribeTrace { trace_id: String },
}

pub async fn live_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (session_id, mut outbound) = state.bus.register();

    tracing::debug!(session = session_id, "live subscriber connected");

    // Writer task: forwards bus frames to the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: subscription commands from the client.
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                if serde_json::from_str::<serde_json::Value>(&text).is_err() {
                    state
                        .bus
                        .send_to(session_id, r#"{"error":"Invalid JSON"}"#.to_string());
                    continue;
                }
                // Well-formed JSON that is not a known command is ignored.
                match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(ClientCommand::SubscribeTrace { trace_id }) => {
                        tracing::debug!(session = session_id, trace_id = %trace_id, "subscribe");
                        state.bus.subscribe_trace(session_id, &trace_id);
                    }
                    Ok(ClientCommand::UnsubscribeTrace { trace_id }) => {
                        tracing::debug!(session = session_id, trace_id = %trace_id, "unsubscribe");
                        state.bus.unsubscribe_trace(session_id, &trace_id);
                    }
                    Err(_) => {}
                }
            }
            Message::Close(_) => break,
            // axum answers WS-level pings itself.
            _ => {}
        }
    }

    state.bus.disconnect(session_id);
    writer.abort();
    tracing::debug!(session = session_id, "live subscriber disconnected");
}
