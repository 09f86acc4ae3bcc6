//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{RetirementOutcome, ScenePhase},
    error::TimerError,
    state::{Timer, TimerId},
};

/// API response envelope for endpoints that change state
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(status: impl Into<String>, message: impl Into<String>, data: T) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new("ok", message, data)
    }
}

/// A timer as seen by clients, with its retirement state attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    pub retirement_pending: bool,
}

/// Result of a confirm or delete request
#[derive(Debug, Clone, Serialize)]
pub struct RetirementResponse {
    pub timer_id: TimerId,
    pub outcome: RetirementOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenePhaseRequest {
    pub phase: ScenePhase,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub scene_phase: ScenePhase,
    pub timers: usize,
}

impl HealthResponse {
    pub fn ok(scene_phase: ScenePhase, timers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            scene_phase,
            timers,
        }
    }
}

/// Body returned for a rejected operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub code: String,
    pub message: String,
}

/// Engine rejection carried out of a handler
#[derive(Debug)]
pub struct ApiError(pub TimerError);

impl From<TimerError> for ApiError {
    fn from(e: TimerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            TimerError::InvalidDuration => StatusCode::UNPROCESSABLE_ENTITY,
            TimerError::TimerNotFound(_) | TimerError::PresetNotFound(_) => StatusCode::NOT_FOUND,
            TimerError::RunningLimitReached { .. }
            | TimerError::FavoritesLimitReached { .. }
            | TimerError::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error".to_string(),
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
