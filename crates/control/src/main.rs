//! Gaze Control - Main Entry Point

use std::sync::Arc;

use camera_capture::ImageSequenceSource;
use control::{init_logging, run_server, AppState, EventBus, GazeController, Settings};
use gaze::ProportionalEyeDetector;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1);
    let settings = Settings::load(path.as_deref())?;
    init_logging(&settings.log_level);

    info!("=== Gaze Control v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Reading frames from {}", settings.camera.device);

    let camera = ImageSequenceSource::new(settings.camera.clone());
    let detector = Arc::new(ProportionalEyeDetector::new(&settings.gaze.detector));
    let controller = GazeController::new(settings.gaze.clone(), Box::new(camera), detector, EventBus::new());

    let mut state = AppState::new(controller);
    if settings.metrics {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => state = state.with_metrics(handle),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    run_server(&settings.bind_addr, Arc::new(state)).await?;

    info!("Server stopped");
    Ok(())
}
