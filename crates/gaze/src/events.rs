//! Outbound notifications: status/prompt events and committed directions

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::calibration::Anchor;
use crate::classifier::Direction;

/// Prompt and status notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Ask the user to look toward an anchor
    CalibrationPrompt { position: Anchor, message: String },
    /// Anchor measured
    AnchorCaptured { position: Anchor },
    /// Anchor could not be measured
    AnchorFailed { position: Anchor, message: String },
    /// Free-form status line
    Status { message: String },
}

impl StatusEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StatusEvent::Status {
            message: message.into(),
        }
    }
}

/// Fire-and-forget receiver of status events
pub trait StatusSink: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Fire-and-forget receiver of committed direction changes
pub trait CommandSink: Send + Sync {
    fn emit(&self, direction: Direction);
}

impl StatusSink for UnboundedSender<StatusEvent> {
    fn notify(&self, event: StatusEvent) {
        // Receiver gone means nobody is listening
        let _ = self.send(event);
    }
}

impl CommandSink for UnboundedSender<Direction> {
    fn emit(&self, direction: Direction) {
        let _ = self.send(direction);
    }
}
