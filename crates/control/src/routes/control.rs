//! Calibration and Tracking Routes

use axum::{extract::State, http::StatusCode, Json};
use gaze::Calibration;
use serde::Serialize;
use std::sync::Arc;

use crate::controller::{ControllerStatus, TrackingStart, TrackingStop};
use crate::{AppState, ControlError};

/// Response for a completed calibration
#[derive(Debug, Serialize)]
pub struct CalibrationResponse {
    pub status: &'static str,
    pub calibration: Calibration,
}

/// Response for a start-tracking request
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: TrackingStart,
}

/// Run calibration to completion
pub async fn start_calibration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CalibrationResponse>, ControlError> {
    let calibration = state.controller.start_calibration().await?;
    Ok(Json(CalibrationResponse {
        status: "success",
        calibration,
    }))
}

/// Start the tracking worker
pub async fn start_tracking(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<StartResponse>), ControlError> {
    let status = state.controller.start_tracking().await?;
    let code = match status {
        TrackingStart::Started => StatusCode::ACCEPTED,
        TrackingStart::AlreadyRunning => StatusCode::OK,
    };
    Ok((code, Json(StartResponse { status })))
}

/// Stop the tracking worker
pub async fn stop_tracking(State(state): State<Arc<AppState>>) -> Result<Json<TrackingStop>, ControlError> {
    Ok(Json(state.controller.stop_tracking().await?))
}

/// Current controller status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ControllerStatus> {
    Json(state.controller.status().await)
}
