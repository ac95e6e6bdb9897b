//! Tracking session
//!
//! Runs detection -> localization -> classification -> stability gate over
//! frames until stopped. Per-frame misses skip the frame; a camera failure
//! ends the session.

use std::sync::Arc;
use std::time::Duration;

use camera_capture::{FrameSource, VideoFrame};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::calibration::Calibration;
use crate::classifier::{Direction, DirectionClassifier, DirectionVote};
use crate::config::{GazeConfig, SessionConfig};
use crate::detector::RegionDetector;
use crate::events::{CommandSink, StatusEvent, StatusSink};
use crate::pupil::PupilLocalizer;
use crate::stability::{GateOutcome, StabilityGate};
use crate::GazeError;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// Stop signal observed
    Stopped,
    /// Frame source reported end of stream
    SourceExhausted,
    /// Camera could not be opened or read
    DeviceFailed(String),
}

/// Counters for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub frames: u64,
    pub detection_misses: u64,
    pub localization_misses: u64,
    pub commits: u64,
    pub rejected_reversals: u64,
    pub final_direction: Option<Direction>,
    pub end: Option<SessionEnd>,
}

/// One tracking run over a frame source
pub struct TrackingSession {
    config: SessionConfig,
    detector: Arc<dyn RegionDetector>,
    localizer: PupilLocalizer,
    classifier: DirectionClassifier,
    calibration: Calibration,
    gate: StabilityGate,
    report: SessionReport,
    last_miss_notice: Option<Instant>,
}

impl TrackingSession {
    pub fn new(config: &GazeConfig, detector: Arc<dyn RegionDetector>, calibration: Calibration) -> Self {
        Self {
            config: config.session.clone(),
            detector,
            localizer: PupilLocalizer::new(&config.localizer),
            classifier: DirectionClassifier::new(&config.classifier),
            calibration,
            gate: StabilityGate::new(&config.stability),
            report: SessionReport::default(),
            last_miss_notice: None,
        }
    }

    /// Currently committed direction
    pub fn current_direction(&self) -> Direction {
        self.gate.current()
    }

    /// Counters so far
    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Run one frame through the pipeline.
    ///
    /// Returns `DetectionMiss`/`LocalizationMiss` for skipped frames.
    pub fn process_frame(&mut self, frame: &VideoFrame) -> Result<GateOutcome, GazeError> {
        self.report.frames += 1;
        metrics::counter!("gaze_frames_total").increment(1);

        let gray = frame.to_gray_image()?;
        let Some(region) = self.detector.detect(&gray).into_iter().next() else {
            self.report.detection_misses += 1;
            metrics::counter!("gaze_detection_miss_total").increment(1);
            return Err(GazeError::DetectionMiss);
        };
        let Some((region, eye)) = region.crop(&gray) else {
            self.report.detection_misses += 1;
            metrics::counter!("gaze_detection_miss_total").increment(1);
            return Err(GazeError::DetectionMiss);
        };

        let Some(pupil) = self.localizer.locate(&eye, frame.sequence) else {
            self.report.localization_misses += 1;
            metrics::counter!("gaze_localization_miss_total").increment(1);
            return Err(GazeError::LocalizationMiss);
        };

        let vote = self.classifier.classify_calibrated(
            pupil.position,
            &self.calibration,
            region.width as f32,
            region.height as f32,
        );
        if vote != DirectionVote::None {
            debug!("frame {} vote {:?}", frame.sequence, vote);
        }

        let outcome = self.gate.observe(vote);
        match outcome {
            GateOutcome::Committed(_) => {
                self.report.commits += 1;
                metrics::counter!("gaze_direction_commits_total").increment(1);
            }
            GateOutcome::ReversalRejected { .. } => {
                self.report.rejected_reversals += 1;
                metrics::counter!("gaze_reversals_rejected_total").increment(1);
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Loop over `source` until the stop signal flips to `true`, the
    /// sender is dropped, or the source ends or fails.
    pub async fn run<S>(
        mut self,
        source: &mut S,
        mut stop: watch::Receiver<bool>,
        status: &dyn StatusSink,
        commands: &dyn CommandSink,
    ) -> SessionReport
    where
        S: FrameSource + ?Sized,
    {
        if let Err(e) = source.open() {
            error!("Tracking aborted, camera unavailable: {}", e);
            status.notify(StatusEvent::status(format!("Camera unavailable: {}", e)));
            return self.finish(SessionEnd::DeviceFailed(e.to_string()));
        }
        info!("Tracking started (direction {})", self.gate.current());
        status.notify(StatusEvent::status("Eye tracking started"));

        let end = loop {
            if *stop.borrow() {
                break SessionEnd::Stopped;
            }

            // Frame read and image work are synchronous
            let step = crate::run_blocking(|| {
                source
                    .next_frame()
                    .map(|frame| frame.map(|frame| (frame.sequence, self.process_frame(&frame))))
            });

            let (sequence, outcome) = match step {
                Ok(Some(step)) => step,
                Ok(None) => {
                    info!("Frame source exhausted");
                    break SessionEnd::SourceExhausted;
                }
                Err(e) => {
                    error!("Camera read failed: {}", e);
                    status.notify(StatusEvent::status(format!("Camera unavailable: {}", e)));
                    break SessionEnd::DeviceFailed(e.to_string());
                }
            };

            match outcome {
                Ok(GateOutcome::Committed(direction)) => commands.emit(direction),
                Ok(_) => {}
                Err(GazeError::DetectionMiss) => self.notice_detection_miss(status),
                Err(e) if e.is_recoverable() => {}
                Err(e) => warn!("Skipping frame {}: {}", sequence, e),
            }

            if Self::pause(self.config.frame_interval(), &mut stop).await {
                break SessionEnd::Stopped;
            }
        };

        source.close();
        status.notify(StatusEvent::status("Eye tracking stopped"));
        self.finish(end)
    }

    /// Sleep one frame interval; `true` if the stop sender went away
    async fn pause(interval: Duration, stop: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            changed = stop.changed() => changed.is_err(),
        }
    }

    fn notice_detection_miss(&mut self, status: &dyn StatusSink) {
        let now = Instant::now();
        let due = self
            .last_miss_notice
            .map_or(true, |last| now.duration_since(last) >= self.config.miss_notice_interval());
        if due {
            self.last_miss_notice = Some(now);
            status.notify(StatusEvent::status("No eyes detected"));
        }
    }

    fn finish(mut self, end: SessionEnd) -> SessionReport {
        info!(
            "Tracking ended ({:?}): {} frames, {} commits, {} detection misses, {} localization misses",
            end,
            self.report.frames,
            self.report.commits,
            self.report.detection_misses,
            self.report.localization_misses
        );
        self.report.final_direction = Some(self.gate.current());
        self.report.end = Some(end);
        self.report
    }
}
