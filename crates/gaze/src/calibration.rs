//! Five-anchor calibration

use std::sync::Arc;
use std::time::Duration;

use camera_capture::{CameraError, FrameSource};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{ClassifierConfig, GazeConfig, LocalizerConfig};
use crate::detector::{EyeRegion, RegionDetector};
use crate::events::{StatusEvent, StatusSink};
use crate::pupil::{Point2D, PupilLocalizer, PupilSample};
use crate::GazeError;

/// Calibration gaze anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Center,
    Left,
    Right,
    Up,
    Down,
}

impl Anchor {
    /// Order in which anchors are prompted
    pub const SEQUENCE: [Anchor; 5] = [Anchor::Center, Anchor::Left, Anchor::Right, Anchor::Up, Anchor::Down];

    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Center => "center",
            Anchor::Left => "left",
            Anchor::Right => "right",
            Anchor::Up => "up",
            Anchor::Down => "down",
        }
    }

    /// Instruction shown to the user
    pub fn prompt(&self) -> &'static str {
        match self {
            Anchor::Center => "Look at the center of the screen",
            Anchor::Left => "Look to the left edge of the screen",
            Anchor::Right => "Look to the right edge of the screen",
            Anchor::Up => "Look to the top of the screen",
            Anchor::Down => "Look to the bottom of the screen",
        }
    }

    fn index(self) -> usize {
        match self {
            Anchor::Center => 0,
            Anchor::Left => 1,
            Anchor::Right => 2,
            Anchor::Up => 3,
            Anchor::Down => 4,
        }
    }
}

/// Anchor samples gathered during one calibration attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationProfile {
    samples: [Option<PupilSample>; 5],
}

impl CalibrationProfile {
    /// Empty profile, all anchors absent
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, anchor: Anchor, sample: PupilSample) {
        self.samples[anchor.index()] = Some(sample);
    }

    pub fn get(&self, anchor: Anchor) -> Option<&PupilSample> {
        self.samples[anchor.index()].as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.samples.iter().all(Option::is_some)
    }

    /// Anchors still unset, in prompt order
    pub fn missing(&self) -> Vec<Anchor> {
        Anchor::SEQUENCE
            .into_iter()
            .filter(|a| self.get(*a).is_none())
            .collect()
    }

    /// Freeze a complete profile into a usable calibration.
    ///
    /// `region` is the eye region size the anchors were measured in; the
    /// per-axis thresholds are derived from the anchor travel within it.
    pub fn complete(&self, region: (f32, f32), config: &ClassifierConfig) -> Result<Calibration, GazeError> {
        let position = |anchor: Anchor| self.get(anchor).map(|s| s.position);
        let (Some(center), Some(left), Some(right), Some(up), Some(down)) = (
            position(Anchor::Center),
            position(Anchor::Left),
            position(Anchor::Right),
            position(Anchor::Up),
            position(Anchor::Down),
        ) else {
            return Err(GazeError::CalibrationIncomplete(self.missing()));
        };

        if !(left.x < center.x && center.x < right.x) {
            return Err(GazeError::CalibrationInconsistent(format!(
                "expected left < center < right on x, got {:.1} / {:.1} / {:.1}",
                left.x, center.x, right.x
            )));
        }
        if !(up.y < center.y && center.y < down.y) {
            return Err(GazeError::CalibrationInconsistent(format!(
                "expected up < center < down on y, got {:.1} / {:.1} / {:.1}",
                up.y, center.y, down.y
            )));
        }

        Ok(Calibration {
            center,
            left,
            right,
            up,
            down,
            thresholds: AxisThresholds::derive(half_spans(left, right, up, down), region, config),
        })
    }
}

/// Per-axis vote thresholds as fractions of the eye region width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisThresholds {
    pub x: f32,
    pub y: f32,
}

impl AxisThresholds {
    /// Share of each axis's measured travel, kept within half to twice the
    /// configured base fraction
    fn derive(spans: (f32, f32), region: (f32, f32), config: &ClassifierConfig) -> Self {
        let base = config.threshold_fraction;
        let fraction = |span: f32, extent: f32| {
            if extent > 0.0 {
                (config.anchor_share * span / extent).max(base / 2.0).min(base * 2.0)
            } else {
                base
            }
        };
        Self {
            x: fraction(spans.0, region.0),
            y: fraction(spans.1, region.1),
        }
    }
}

/// Complete calibration (every anchor measured)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub center: Point2D,
    pub left: Point2D,
    pub right: Point2D,
    pub up: Point2D,
    pub down: Point2D,
    /// Thresholds derived from the measured anchor travel
    pub thresholds: AxisThresholds,
}

impl Calibration {
    /// Reference point offsets are measured from
    pub fn origin(&self) -> Point2D {
        self.center
    }

    /// Half the measured left-right and up-down pupil travel
    pub fn axis_spans(&self) -> (f32, f32) {
        half_spans(self.left, self.right, self.up, self.down)
    }
}

fn half_spans(left: Point2D, right: Point2D, up: Point2D, down: Point2D) -> (f32, f32) {
    ((right.x - left.x).abs() / 2.0, (down.y - up.y).abs() / 2.0)
}

/// Runs the prompted five-anchor calibration sequence
pub struct CalibrationProcedure {
    dwell: Duration,
    localizer: LocalizerConfig,
    classifier: ClassifierConfig,
    detector: Arc<dyn RegionDetector>,
}

impl CalibrationProcedure {
    pub fn new(config: &GazeConfig, detector: Arc<dyn RegionDetector>) -> Self {
        Self {
            dwell: config.calibration.dwell(),
            localizer: config.localizer.clone(),
            classifier: config.classifier.clone(),
            detector,
        }
    }

    /// Prompt each anchor, wait the dwell time, and measure one frame.
    ///
    /// A detection or localization miss is reported and skipped; the attempt
    /// fails as a whole if any anchor is missing at the end. A camera that
    /// cannot be read (or runs out of frames) ends the attempt immediately.
    pub async fn run<S>(&self, source: &mut S, sink: &dyn StatusSink) -> Result<Calibration, GazeError>
    where
        S: FrameSource + ?Sized,
    {
        if let Err(e) = source.open() {
            error!("Calibration aborted, camera unavailable: {}", e);
            sink.notify(StatusEvent::status(format!("Camera unavailable: {}", e)));
            return Err(e.into());
        }
        info!("Calibration started ({} anchors, {:?} dwell)", Anchor::SEQUENCE.len(), self.dwell);

        let mut profile = CalibrationProfile::new();
        let mut localizer = PupilLocalizer::new(&self.localizer);
        let mut region_size = None;

        for anchor in Anchor::SEQUENCE {
            sink.notify(StatusEvent::CalibrationPrompt {
                position: anchor,
                message: anchor.prompt().to_string(),
            });
            tokio::time::sleep(self.dwell).await;

            localizer.reset();
            match crate::run_blocking(|| self.capture(source, &mut localizer)) {
                Ok((sample, region)) => {
                    info!(
                        "Anchor {} captured at ({:.1}, {:.1})",
                        anchor.as_str(),
                        sample.position.x,
                        sample.position.y
                    );
                    profile.set(anchor, sample);
                    if anchor == Anchor::Center {
                        region_size = Some((region.width as f32, region.height as f32));
                    }
                    sink.notify(StatusEvent::AnchorCaptured { position: anchor });
                }
                Err(GazeError::DeviceUnavailable(e)) => {
                    error!("Calibration aborted at anchor {}: {}", anchor.as_str(), e);
                    source.close();
                    sink.notify(StatusEvent::status(format!("Camera unavailable: {}", e)));
                    return Err(GazeError::DeviceUnavailable(e));
                }
                Err(e) => {
                    warn!("Anchor {} failed: {}", anchor.as_str(), e);
                    sink.notify(StatusEvent::AnchorFailed {
                        position: anchor,
                        message: e.to_string(),
                    });
                }
            }
        }
        source.close();

        // Center missing means the profile is incomplete and the size unused
        let region_size = region_size.unwrap_or((0.0, 0.0));
        match profile.complete(region_size, &self.classifier) {
            Ok(calibration) => {
                let (x_span, y_span) = calibration.axis_spans();
                info!(
                    "Calibration complete (pupil travel x={:.1}px, y={:.1}px, thresholds x={:.3}, y={:.3})",
                    x_span, y_span, calibration.thresholds.x, calibration.thresholds.y
                );
                sink.notify(StatusEvent::status("Calibration complete"));
                Ok(calibration)
            }
            Err(e) => {
                warn!("{}", e);
                sink.notify(StatusEvent::status(format!("Calibration failed: {}", e)));
                Err(e)
            }
        }
    }

    fn capture<S>(&self, source: &mut S, localizer: &mut PupilLocalizer) -> Result<(PupilSample, EyeRegion), GazeError>
    where
        S: FrameSource + ?Sized,
    {
        let frame = source
            .next_frame()?
            .ok_or_else(|| CameraError::Stream("stream ended during calibration".into()))?;
        let gray = frame.to_gray_image()?;

        let region = self
            .detector
            .detect(&gray)
            .into_iter()
            .next()
            .ok_or(GazeError::DetectionMiss)?;
        let (region, eye) = region.crop(&gray).ok_or(GazeError::DetectionMiss)?;

        let sample = localizer
            .locate(&eye, frame.sequence)
            .ok_or(GazeError::LocalizationMiss)?;
        Ok((sample, region))
    }
}
