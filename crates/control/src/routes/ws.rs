//! WebSocket event stream

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::events::ClientEvent;
use crate::AppState;

/// Upgrade to a WebSocket that streams [`ClientEvent`]s as JSON
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.controller.events().subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

async fn send_event(socket: &mut WebSocket, event: &ClientEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode event: {}", e);
            true
        }
    }
}

async fn stream_events(mut socket: WebSocket, mut rx: broadcast::Receiver<ClientEvent>) {
    debug!("Client connected");
    let greeting = ClientEvent::Status {
        message: "Connected to server".to_string(),
    };
    if !send_event(&mut socket, &greeting).await {
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if !send_event(&mut socket, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Client lagging, skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Client disconnected");
}
