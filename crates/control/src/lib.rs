//! Gaze Control Server
//!
//! HTTP control surface and WebSocket event stream for gaze-driven game
//! control.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod controller;
pub mod events;
mod routes;
pub mod settings;

pub use controller::{ControllerStatus, GazeController, Phase, TrackingStart, TrackingStop};
pub use events::{ClientEvent, EventBus};
pub use settings::Settings;

use gaze::GazeError;

/// Control surface error types
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Please calibrate first")]
    NotCalibrated,

    #[error("Cannot start while {0} is active")]
    Busy(Phase),

    #[error("Camera is held by a worker that did not return it")]
    CameraMissing,

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Gaze(#[from] GazeError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ControlError {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            ControlError::NotCalibrated => (StatusCode::PRECONDITION_FAILED, "not_calibrated"),
            ControlError::Busy(_) => (StatusCode::CONFLICT, "busy"),
            ControlError::Gaze(GazeError::CalibrationIncomplete(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "calibration_incomplete")
            }
            ControlError::Gaze(GazeError::CalibrationInconsistent(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "calibration_inconsistent")
            }
            ControlError::Gaze(GazeError::DeviceUnavailable(_)) | ControlError::CameraMissing => {
                (StatusCode::SERVICE_UNAVAILABLE, "device_unavailable")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let (status, code) = self.code();
        (status, Json(json!({ "status": code, "error": self.to_string() }))).into_response()
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Calibration and tracking controller
    pub controller: GazeController,
    /// Prometheus renderer, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(controller: GazeController) -> Self {
        Self {
            controller,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub phase: Phase,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/status", get(routes::control::get_status))
        .route("/api/v1/calibration", post(routes::control::start_calibration))
        .route("/api/v1/tracking/start", post(routes::control::start_tracking))
        .route("/api/v1/tracking/stop", post(routes::control::stop_tracking))
        .route("/api/v1/voice", post(routes::voice::post_transcript))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(routes::ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        phase: state.controller.status().await.phase,
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Initialize logging
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Run the server until Ctrl-C, then stop any running tracking session
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let controller = state.controller.clone();
    let app = create_router(state);

    info!("Starting control server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await?;

    controller.stop_tracking().await?;
    Ok(())
}
