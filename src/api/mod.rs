//! HTTP API module
//! 
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::TimerEngine;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(engine: Arc<TimerEngine>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler).post(add_timer_handler))
        .route("/timers/:id", get(get_timer_handler).delete(delete_handler))
        .route("/timers/:id/pause", post(pause_handler))
        .route("/timers/:id/resume", post(resume_handler))
        .route("/timers/:id/stop", post(stop_handler))
        .route("/timers/:id/restart", post(restart_handler))
        .route("/timers/:id/favorite", post(favorite_handler))
        .route("/timers/:id/confirm", post(confirm_handler))
        .route("/presets", get(list_presets_handler))
        .route("/presets/:id/run", post(run_preset_handler))
        .route("/scene-phase", post(scene_phase_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}
