//! Server settings
//!
//! Loaded from an optional `gaze-control.{toml,yaml,json}` file and
//! `GAZE_`-prefixed environment variables (`__` separates nesting, e.g.
//! `GAZE_GAZE__STABILITY__THRESHOLD=4`).

use camera_capture::CameraConfig;
use config::{Config, Environment, File};
use gaze::GazeConfig;
use serde::{Deserialize, Serialize};

use crate::ControlError;

/// Default settings file stem
const DEFAULT_FILE: &str = "gaze-control";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address
    pub bind_addr: String,
    /// Max tracing level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Serve Prometheus metrics at /metrics
    pub metrics: bool,
    pub camera: CameraConfig,
    pub gaze: GazeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5050".to_string(),
            log_level: "info".to_string(),
            metrics: true,
            camera: CameraConfig::default(),
            gaze: GazeConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings; an explicit `path` must exist, the default file may not
    pub fn load(path: Option<&str>) -> Result<Self, ControlError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("GAZE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.gaze.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind_addr, "0.0.0.0:5050");
        assert_eq!(settings.gaze.stability.threshold, 3);
        assert!(settings.camera.looped);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Settings::load(Some("/nonexistent/gaze-control-settings"));
        assert!(matches!(result, Err(ControlError::Config(_))));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = std::env::temp_dir().join(format!("gaze-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(
            &path,
            "bind_addr = \"127.0.0.1:9000\"\n[gaze.stability]\nthreshold = 5\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
        assert_eq!(settings.gaze.stability.threshold, 5);
        assert_eq!(settings.gaze.localizer.window_capacity, 5);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_gaze_config_rejected() {
        let dir = std::env::temp_dir().join(format!("gaze-settings-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, "[gaze.stability]\nthreshold = 0\n").unwrap();

        let result = Settings::load(Some(path.to_str().unwrap()));
        assert!(matches!(result, Err(ControlError::Gaze(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
