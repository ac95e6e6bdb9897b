//! Voice Routes
//!
//! Transcription happens client-side; this maps a transcript to a direction
//! and forwards it to the game like any other command.

use axum::{extract::State, Json};
use gaze::Direction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::events::ClientEvent;
use crate::AppState;

/// Request body for the voice endpoint
#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    pub transcript: String,
}

/// Response for the voice endpoint
#[derive(Debug, Serialize)]
pub struct VoiceResponse {
    pub command: String,
    pub direction: Option<Direction>,
}

/// Publish a recognized voice command
pub async fn post_transcript(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VoiceRequest>,
) -> Json<VoiceResponse> {
    let command = request.transcript.trim().to_lowercase();
    let direction = Direction::from_keyword(&command);
    info!("Voice command {:?} -> {:?}", command, direction);

    state.controller.events().publish(ClientEvent::VoiceCommand {
        command: command.clone(),
        direction,
    });

    Json(VoiceResponse { command, direction })
}
