//! Gaze pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Direction, GazeError};

/// Gaze pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub detector: DetectorConfig,
    pub localizer: LocalizerConfig,
    pub classifier: ClassifierConfig,
    pub stability: StabilityConfig,
    pub calibration: CalibrationConfig,
    pub session: SessionConfig,
}

/// Proportional eye detector layout (fractions of the frame)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Eye box width as a fraction of frame width
    pub eye_width_fraction: f32,
    /// Eye box height as a fraction of frame height
    pub eye_height_fraction: f32,
    /// Minimum intensity standard deviation for a frame to contain a face
    pub min_frame_contrast: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            eye_width_fraction: 0.16,
            eye_height_fraction: 0.12,
            min_frame_contrast: 8.0,
        }
    }
}

/// Pupil localizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Smoothing window capacity (samples)
    pub window_capacity: usize,
    /// Gaussian blur sigma; 0 disables blurring
    pub blur_sigma: f32,
    /// Dark cutoff as a fraction of the way from the minimum to the mean intensity
    pub dark_fraction: f32,
    /// Minimum max-min intensity spread for a crop to contain a pupil
    pub min_contrast: u8,
    /// Smallest dark blob accepted (pixels)
    pub min_blob_area: u32,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            window_capacity: 5,
            blur_sigma: 1.5,
            dark_fraction: 0.5,
            min_contrast: 10,
            min_blob_area: 4,
        }
    }
}

/// Direction classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base axis threshold as a fraction of region size
    pub threshold_fraction: f32,
    /// Multiplier applied to the base threshold before a vote is cast
    pub hysteresis: f32,
    /// Share of the calibrated center-to-anchor travel used as the
    /// calibrated threshold, kept within half to twice the base fraction
    pub anchor_share: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.15,
            hysteresis: 1.2,
            anchor_share: 0.5,
        }
    }
}

/// Stability gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Consecutive votes required to commit a change
    pub threshold: u32,
    /// Committed direction at session start
    pub initial_direction: Direction,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            initial_direction: Direction::Right,
        }
    }
}

/// Calibration procedure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Time the user is given to look at each anchor (milliseconds)
    pub dwell_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { dwell_ms: 2000 }
    }
}

impl CalibrationConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

/// Tracking loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between loop iterations (milliseconds)
    pub frame_interval_ms: u64,
    /// Minimum gap between "no eyes detected" notices (milliseconds)
    pub miss_notice_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 50,
            miss_notice_interval_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn miss_notice_interval(&self) -> Duration {
        Duration::from_millis(self.miss_notice_interval_ms)
    }
}

impl GazeConfig {
    /// Faster reaction: shorter window, lower commit threshold
    pub fn responsive() -> Self {
        Self {
            localizer: LocalizerConfig {
                window_capacity: 3,
                ..Default::default()
            },
            stability: StabilityConfig {
                threshold: 2,
                ..Default::default()
            },
            session: SessionConfig {
                frame_interval_ms: 33,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Noisier cameras: longer window, higher commit threshold
    pub fn steady() -> Self {
        Self {
            localizer: LocalizerConfig {
                window_capacity: 7,
                ..Default::default()
            },
            stability: StabilityConfig {
                threshold: 4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), GazeError> {
        if self.stability.threshold == 0 {
            return Err(GazeError::Config("stability.threshold must be at least 1".into()));
        }
        if self.localizer.window_capacity == 0 {
            return Err(GazeError::Config("localizer.window_capacity must be at least 1".into()));
        }
        if !(self.localizer.dark_fraction >= 0.0 && self.localizer.dark_fraction <= 1.0) {
            return Err(GazeError::Config("localizer.dark_fraction must be within 0..=1".into()));
        }
        if !(self.localizer.blur_sigma >= 0.0) {
            return Err(GazeError::Config("localizer.blur_sigma must not be negative".into()));
        }
        if !(self.classifier.threshold_fraction > 0.0 && self.classifier.threshold_fraction < 0.5) {
            return Err(GazeError::Config("classifier.threshold_fraction must be within (0, 0.5)".into()));
        }
        if !(self.classifier.hysteresis >= 1.0 && self.classifier.hysteresis.is_finite()) {
            return Err(GazeError::Config("classifier.hysteresis must be at least 1.0".into()));
        }
        if !(self.classifier.anchor_share > 0.0 && self.classifier.anchor_share <= 1.0) {
            return Err(GazeError::Config("classifier.anchor_share must be within (0, 1]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GazeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stability.threshold, 3);
        assert_eq!(config.localizer.window_capacity, 5);
        assert_eq!(config.session.frame_interval(), Duration::from_millis(50));
        assert_eq!(config.calibration.dwell(), Duration::from_secs(2));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(GazeConfig::responsive().validate().is_ok());
        assert!(GazeConfig::steady().validate().is_ok());
        assert!(GazeConfig::steady().stability.threshold > GazeConfig::responsive().stability.threshold);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = GazeConfig::default();
        config.stability.threshold = 0;
        assert!(matches!(config.validate(), Err(GazeError::Config(_))));
    }

    #[test]
    fn test_hysteresis_below_one_rejected() {
        let mut config = GazeConfig::default();
        config.classifier.hysteresis = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_classifier_values_rejected() {
        let mut config = GazeConfig::default();
        config.classifier.threshold_fraction = f32::NAN;
        assert!(matches!(config.validate(), Err(GazeError::Config(_))));

        let mut config = GazeConfig::default();
        config.classifier.hysteresis = f32::NAN;
        assert!(matches!(config.validate(), Err(GazeError::Config(_))));

        let mut config = GazeConfig::default();
        config.classifier.anchor_share = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_localizer_values_rejected() {
        let mut config = GazeConfig::default();
        config.localizer.dark_fraction = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = GazeConfig::default();
        config.localizer.blur_sigma = f32::NAN;
        assert!(config.validate().is_err());
    }
}
