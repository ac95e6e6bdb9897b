//! Gaze controller
//!
//! Owns the camera, the calibration, and the single tracking worker.
//! Calibration and tracking are mutually exclusive: the camera moves into
//! whichever is running and comes back when it finishes. Every
//! check-then-set on the phase happens under one lock.

use std::fmt;
use std::sync::Arc;

use camera_capture::FrameSource;
use gaze::{Calibration, CalibrationProcedure, GazeConfig, RegionDetector, SessionReport, TrackingSession};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::EventBus;
use crate::ControlError;

type Camera = Box<dyn FrameSource>;

/// What currently owns the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Calibrating,
    Tracking,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Calibrating => "calibrating",
            Phase::Tracking => "tracking",
        })
    }
}

/// Result of a start-tracking request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStart {
    Started,
    AlreadyRunning,
}

/// Result of a stop-tracking request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingStop {
    Stopped { report: SessionReport },
    NotRunning,
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub phase: Phase,
    pub calibrated: bool,
    pub calibration: Option<Calibration>,
    pub direction: Option<gaze::Direction>,
    pub last_session: Option<SessionReport>,
}

struct RunningSession {
    stop: watch::Sender<bool>,
    handle: JoinHandle<(Camera, SessionReport)>,
}

enum PhaseState {
    Idle,
    Calibrating,
    Tracking(RunningSession),
}

struct Inner {
    phase: PhaseState,
    camera: Option<Camera>,
    calibration: Option<Calibration>,
    last_report: Option<SessionReport>,
}

struct Shared {
    config: GazeConfig,
    detector: Arc<dyn RegionDetector>,
    events: EventBus,
    inner: Mutex<Inner>,
}

/// Cloneable handle to the controller
#[derive(Clone)]
pub struct GazeController {
    shared: Arc<Shared>,
}

impl GazeController {
    pub fn new(config: GazeConfig, camera: Camera, detector: Arc<dyn RegionDetector>, events: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                detector,
                events,
                inner: Mutex::new(Inner {
                    phase: PhaseState::Idle,
                    camera: Some(camera),
                    calibration: None,
                    last_report: None,
                }),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Run the full calibration sequence; resolves when it finishes.
    ///
    /// A new attempt discards any previous calibration.
    pub async fn start_calibration(&self) -> Result<Calibration, ControlError> {
        let mut camera = {
            let mut inner = self.shared.inner.lock().await;
            Self::reap(&mut inner).await;
            match inner.phase {
                PhaseState::Idle => {}
                PhaseState::Calibrating => return Err(ControlError::Busy(Phase::Calibrating)),
                PhaseState::Tracking(_) => return Err(ControlError::Busy(Phase::Tracking)),
            }
            let camera = inner.camera.take().ok_or(ControlError::CameraMissing)?;
            inner.phase = PhaseState::Calibrating;
            inner.calibration = None;
            camera
        };

        // Own task so a dropped request cannot strand the camera
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let procedure = CalibrationProcedure::new(&shared.config, shared.detector.clone());
            let result = procedure.run(&mut camera, &shared.events).await;

            let mut inner = shared.inner.lock().await;
            inner.camera = Some(camera);
            inner.phase = PhaseState::Idle;
            if let Ok(calibration) = &result {
                inner.calibration = Some(*calibration);
            }
            result
        });

        match task.await {
            Ok(result) => Ok(result?),
            Err(e) => {
                error!("Calibration task failed: {}", e);
                let mut inner = self.shared.inner.lock().await;
                inner.phase = PhaseState::Idle;
                Err(ControlError::Worker(e.to_string()))
            }
        }
    }

    /// Launch the tracking worker
    pub async fn start_tracking(&self) -> Result<TrackingStart, ControlError> {
        let mut inner = self.shared.inner.lock().await;
        Self::reap(&mut inner).await;
        match inner.phase {
            PhaseState::Idle => {}
            PhaseState::Tracking(_) => return Ok(TrackingStart::AlreadyRunning),
            PhaseState::Calibrating => return Err(ControlError::Busy(Phase::Calibrating)),
        }

        let calibration = inner.calibration.ok_or(ControlError::NotCalibrated)?;
        let mut camera = inner.camera.take().ok_or(ControlError::CameraMissing)?;

        let (stop, stop_rx) = watch::channel(false);
        let session = TrackingSession::new(&self.shared.config, self.shared.detector.clone(), calibration);
        let events = self.shared.events.clone();
        let handle = tokio::spawn(async move {
            let report = session.run(&mut camera, stop_rx, &events, &events).await;
            (camera, report)
        });

        inner.phase = PhaseState::Tracking(RunningSession { stop, handle });
        info!("Tracking worker launched");
        Ok(TrackingStart::Started)
    }

    /// Signal the worker and wait for it to hand the camera back
    pub async fn stop_tracking(&self) -> Result<TrackingStop, ControlError> {
        let mut inner = self.shared.inner.lock().await;
        Self::reap(&mut inner).await;
        match std::mem::replace(&mut inner.phase, PhaseState::Idle) {
            PhaseState::Tracking(running) => {
                // Worker may already be exiting on its own
                let _ = running.stop.send(true);
                let report = Self::join(running.handle, &mut inner).await?;
                Ok(TrackingStop::Stopped { report })
            }
            other => {
                inner.phase = other;
                Ok(TrackingStop::NotRunning)
            }
        }
    }

    pub async fn status(&self) -> ControllerStatus {
        let mut inner = self.shared.inner.lock().await;
        Self::reap(&mut inner).await;
        ControllerStatus {
            phase: match inner.phase {
                PhaseState::Idle => Phase::Idle,
                PhaseState::Calibrating => Phase::Calibrating,
                PhaseState::Tracking(_) => Phase::Tracking,
            },
            calibrated: inner.calibration.is_some(),
            calibration: inner.calibration,
            direction: self.shared.events.last_direction(),
            last_session: inner.last_report.clone(),
        }
    }

    /// Collect a worker that ended by itself (source exhausted or failed)
    async fn reap(inner: &mut Inner) {
        let finished = matches!(&inner.phase, PhaseState::Tracking(running) if running.handle.is_finished());
        if !finished {
            return;
        }
        if let PhaseState::Tracking(running) = std::mem::replace(&mut inner.phase, PhaseState::Idle) {
            if let Err(e) = Self::join(running.handle, inner).await {
                warn!("Finished tracking worker could not be collected: {}", e);
            }
        }
    }

    async fn join(handle: JoinHandle<(Camera, SessionReport)>, inner: &mut Inner) -> Result<SessionReport, ControlError> {
        match handle.await {
            Ok((camera, report)) => {
                inner.camera = Some(camera);
                inner.last_report = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                error!("Tracking worker failed, camera lost: {}", e);
                Err(ControlError::Worker(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{CameraError, ReplaySource, VideoFrame};
    use gaze::{EyeRegion, FixedRegionDetector, GazeError};

    struct BrokenCamera;

    impl FrameSource for BrokenCamera {
        fn open(&mut self) -> Result<(), CameraError> {
            Err(CameraError::Open("no device".into()))
        }

        fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            Err(CameraError::NotInitialized)
        }
    }

    fn controller(camera: Camera) -> GazeController {
        let detector = Arc::new(FixedRegionDetector::new(vec![EyeRegion::new(0, 0, 10, 10)]));
        GazeController::new(GazeConfig::default(), camera, detector, EventBus::new())
    }

    #[tokio::test]
    async fn test_initial_status() {
        let status = controller(Box::new(ReplaySource::new(vec![]))).status().await;
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.calibrated);
        assert!(status.direction.is_none());
        assert!(status.last_session.is_none());
    }

    #[tokio::test]
    async fn test_camera_returned_after_failed_calibration() {
        let controller = controller(Box::new(BrokenCamera));

        for _ in 0..2 {
            let result = controller.start_calibration().await;
            assert!(matches!(result, Err(ControlError::Gaze(GazeError::DeviceUnavailable(_)))));
        }
        assert_eq!(controller.status().await.phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_source_ends_calibration() {
        let controller = controller(Box::new(ReplaySource::new(vec![])));

        for _ in 0..2 {
            let result = controller.start_calibration().await;
            assert!(matches!(result, Err(ControlError::Gaze(GazeError::DeviceUnavailable(_)))));
        }
        let status = controller.status().await;
        assert!(!status.calibrated);
        assert_eq!(status.phase, Phase::Idle);
    }

    #[test]
    fn test_phase_wire_name_matches_display() {
        for phase in [Phase::Idle, Phase::Calibrating, Phase::Tracking] {
            let json = serde_json::to_value(phase).unwrap();
            assert_eq!(json, serde_json::Value::String(phase.to_string()));
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Calibrating.to_string(), "calibrating");
        assert_eq!(Phase::Tracking.to_string(), "tracking");
    }
}
