//! Camera Capture Library for Gaze Control
//!
//! Provides the frame types and frame sources consumed by the gaze pipeline.
//! Supports:
//! - In-memory replay of pre-built frames (tests, demos)
//! - Image-sequence replay from a directory of captured frames

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageSequenceSource, ReplaySource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame location (directory of captured frames)
    pub device: String,
    /// Restart from the first frame once the sequence is exhausted
    pub looped: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "./frames".to_string(),
            looped: true,
        }
    }
}

impl CameraConfig {
    /// Create a one-shot config that ends after the last frame
    pub fn once(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            looped: false,
        }
    }
}
