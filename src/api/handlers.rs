//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{debug, info};

use crate::{
    engine::TimerEngine,
    state::{NewTimer, Preset, PresetId, Timer, TimerId},
};
use super::responses::{
    ApiError, ApiResponse, HealthResponse, RetirementResponse, ScenePhaseRequest, TimerView,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn view(engine: &TimerEngine, timer: Timer) -> TimerView {
    TimerView {
        retirement_pending: engine.retirement_pending(timer.id),
        timer,
    }
}

fn respond(engine: &TimerEngine, message: &str, timer: Timer) -> ApiResult<TimerView> {
    Ok(Json(ApiResponse::ok(message, view(engine, timer))))
}

/// Handle GET /timers
pub async fn list_timers_handler(State(engine): State<Arc<TimerEngine>>) -> Json<Vec<TimerView>> {
    let timers = engine.timers().into_iter().map(|t| view(&engine, t)).collect();
    Json(timers)
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> Result<Json<TimerView>, StatusCode> {
    match engine.timer(id) {
        Some(timer) => Ok(Json(view(&engine, timer))),
        None => {
            debug!(timer_id = %id, "Timer lookup missed");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Handle POST /timers - Create and start a timer
pub async fn add_timer_handler(
    State(engine): State<Arc<TimerEngine>>,
    Json(request): Json<NewTimer>,
) -> Result<(StatusCode, Json<ApiResponse<TimerView>>), ApiError> {
    let timer = engine.add_timer(request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Timer started", view(&engine, timer)))))
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerView> {
    let timer = engine.pause_timer(id)?;
    respond(&engine, "Timer paused", timer)
}

/// Handle POST /timers/:id/resume
pub async fn resume_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerView> {
    let timer = engine.resume_timer(id)?;
    respond(&engine, "Timer resumed", timer)
}

/// Handle POST /timers/:id/stop
pub async fn stop_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerView> {
    let timer = engine.stop_timer(id)?;
    respond(&engine, "Timer stopped", timer)
}

/// Handle POST /timers/:id/restart
pub async fn restart_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerView> {
    let timer = engine.restart_timer(id)?;
    respond(&engine, "Timer restarted", timer)
}

/// Handle POST /timers/:id/favorite - Flip between keep and discard
pub async fn favorite_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerView> {
    let timer = engine.toggle_favorite(id)?;
    respond(&engine, "End action updated", timer)
}

/// Handle POST /timers/:id/confirm - Dismiss a completed timer now
pub async fn confirm_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<RetirementResponse> {
    let outcome = engine.user_did_confirm_completion(id)?;
    info!(timer_id = %id, ?outcome, "Completion confirmed");
    Ok(Json(ApiResponse::ok("Timer retired", RetirementResponse { timer_id: id, outcome })))
}

/// Handle DELETE /timers/:id
pub async fn delete_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<TimerId>,
) -> ApiResult<RetirementResponse> {
    let outcome = engine.user_did_request_delete(id)?;
    Ok(Json(ApiResponse::ok("Timer removed", RetirementResponse { timer_id: id, outcome })))
}

/// Handle GET /presets - Visible favorites only
pub async fn list_presets_handler(State(engine): State<Arc<TimerEngine>>) -> Json<Vec<Preset>> {
    Json(engine.presets().into_iter().filter(|p| !p.is_hidden).collect())
}

/// Handle POST /presets/:id/run
pub async fn run_preset_handler(
    State(engine): State<Arc<TimerEngine>>,
    Path(id): Path<PresetId>,
) -> Result<(StatusCode, Json<ApiResponse<TimerView>>), ApiError> {
    let timer = engine.run_timer(id)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Timer started from preset", view(&engine, timer)))))
}

/// Handle POST /scene-phase - Host foreground/background transitions
pub async fn scene_phase_handler(
    State(engine): State<Arc<TimerEngine>>,
    Json(request): Json<ScenePhaseRequest>,
) -> Json<ApiResponse<ScenePhaseRequest>> {
    engine.update_scene_phase(request.phase).await;
    Json(ApiResponse::ok("Scene phase updated", ScenePhaseRequest { phase: engine.scene_phase() }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(engine): State<Arc<TimerEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(engine.scene_phase(), engine.timers().len()))
}
