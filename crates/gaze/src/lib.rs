//! Gaze-to-Direction Pipeline
//!
//! Turns webcam frames into stable four-way direction commands:
//! - Eye region detection (pluggable)
//! - Pupil localization with temporal smoothing
//! - Five-anchor calibration
//! - Dead-zone direction classification
//! - Debounced direction commits with reversal rejection

pub mod calibration;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod events;
pub mod pupil;
pub mod session;
pub mod stability;

pub use calibration::{Anchor, AxisThresholds, Calibration, CalibrationProcedure, CalibrationProfile};
pub use classifier::{Direction, DirectionClassifier, DirectionVote};
pub use config::GazeConfig;
pub use detector::{EyeRegion, FixedRegionDetector, ProportionalEyeDetector, RegionDetector};
pub use events::{CommandSink, StatusEvent, StatusSink};
pub use pupil::{Point2D, PupilLocalizer, PupilSample};
pub use session::{SessionEnd, SessionReport, TrackingSession};
pub use stability::{GateOutcome, StabilityGate};

use camera_capture::CameraError;
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Gaze pipeline error types
#[derive(Error, Debug)]
pub enum GazeError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(#[from] CameraError),

    #[error("No eye region detected")]
    DetectionMiss,

    #[error("Pupil could not be localized")]
    LocalizationMiss,

    #[error("Calibration incomplete, missing anchors: {0:?}")]
    CalibrationIncomplete(Vec<Anchor>),

    #[error("Calibration inconsistent: {0}")]
    CalibrationInconsistent(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GazeError {
    /// Per-frame misses that only skip the current frame
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GazeError::DetectionMiss | GazeError::LocalizationMiss)
    }
}

/// Run synchronous frame work without stalling other tasks on the worker.
///
/// `block_in_place` is only available on the multi-threaded runtime; on a
/// current-thread runtime the closure runs inline.
pub(crate) fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
