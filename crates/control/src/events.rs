//! Event bus fanning pipeline output out to connected clients

use std::sync::Arc;

use gaze::{Anchor, CommandSink, Direction, StatusEvent, StatusSink};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 64;

/// Event pushed to clients over the WebSocket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    EyeCommand { direction: Direction },
    VoiceCommand { command: String, direction: Option<Direction> },
    Status { message: String },
    Calibration { position: Anchor, message: String },
}

impl From<StatusEvent> for ClientEvent {
    fn from(event: StatusEvent) -> Self {
        match event {
            StatusEvent::CalibrationPrompt { position, message } => ClientEvent::Calibration { position, message },
            StatusEvent::AnchorCaptured { position } => ClientEvent::Calibration {
                position,
                message: format!("Captured {} position", position.as_str()),
            },
            StatusEvent::AnchorFailed { position, message } => ClientEvent::Calibration {
                position,
                message: format!("Could not capture {} position: {}", position.as_str(), message),
            },
            StatusEvent::Status { message } => ClientEvent::Status { message },
        }
    }
}

/// Broadcast hub; also remembers the last committed direction
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
    direction: Arc<watch::Sender<Option<Direction>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (direction, _) = watch::channel(None);
        Self {
            tx,
            direction: Arc::new(direction),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ClientEvent) {
        // No subscribers is fine
        if self.tx.send(event).is_err() {
            debug!("Event dropped, no subscribers");
        }
    }

    /// Last direction committed by a tracking session
    pub fn last_direction(&self) -> Option<Direction> {
        *self.direction.borrow()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for EventBus {
    fn notify(&self, event: StatusEvent) {
        self.publish(event.into());
    }
}

impl CommandSink for EventBus {
    fn emit(&self, direction: Direction) {
        self.direction.send_replace(Some(direction));
        self.publish(ClientEvent::EyeCommand { direction });
    }
}
