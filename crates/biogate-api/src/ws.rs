//! Live event stream over WebSocket.
//!
//! Each dashboard client gets its own bus subscription with a bounded
//! backlog; there is no replay guarantee beyond that backlog. Frames:
//! - `{"event":"attendance_data","data":{...}}`
//! - `{"event":"device_status","data":"connected"|"disconnected"}`
//! - `{"event":"command_completed","data":{...}}`
//! - `{"event":"overflow","dropped":n}`

use std::time::Duration;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};

use biogate_core::event::GatewayEvent;

use crate::AppState;

/// How long one drain cycle waits before re-checking the socket.
const DRAIN_WAIT: Duration = Duration::from_secs(1);

/// Upgrade handler for the event stream.
pub async fn event_ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let sub = state.gateway.subscribe();
    tracing::debug!(subscriber = %sub.id(), "dashboard client connected");

    // Tell the client where the device stands right now.
    let status = state.gateway.status().await;
    let initial = status_frame(status.connected);
    if socket.send(Message::Text(initial)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            batch = sub.drain(DRAIN_WAIT) => {
                for event in batch {
                    let frame = event_frame(&event);
                    if socket.send(Message::Text(frame)).await.is_err() {
                        tracing::debug!(subscriber = %sub.id(), "dashboard client send failed");
                        return;
                    }
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {
                        tracing::debug!(subscriber = %sub.id(), "dashboard client disconnected");
                        return;
                    }
                    // Pings are answered by axum; other frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn status_frame(connected: bool) -> String {
    serde_json::json!({
        "event": "device_status",
        "data": if connected { "connected" } else { "disconnected" },
    })
    .to_string()
}

fn event_frame(event: &GatewayEvent) -> String {
    match event {
        GatewayEvent::Attendance(punch) => serde_json::json!({
            "event": "attendance_data",
            "data": punch,
        })
        .to_string(),
        GatewayEvent::ConnectivityChanged { to, .. } => status_frame(to.is_usable()),
        GatewayEvent::CommandCompleted(result) => serde_json::json!({
            "event": "command_completed",
            "data": result,
        })
        .to_string(),
        GatewayEvent::Overflow { dropped } => serde_json::json!({
            "event": "overflow",
            "dropped": dropped,
        })
        .to_string(),
    }
}
