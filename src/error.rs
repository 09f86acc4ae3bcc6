//! Error types surfaced by the timer engine and the notification boundary

use thiserror::Error;

use crate::state::{PresetId, TimerId, TimerStatus};

/// Why an engine operation was rejected.
///
/// A rejected operation never mutates any store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("timer duration must be greater than zero")]
    InvalidDuration,

    #[error("running timer limit of {limit} reached")]
    RunningLimitReached { limit: usize },

    #[error("favorites limit of {limit} reached")]
    FavoritesLimitReached { limit: usize },

    #[error("preset {0} no longer exists")]
    PresetNotFound(PresetId),

    #[error("timer {0} not found")]
    TimerNotFound(TimerId),

    #[error("cannot {action} a {status} timer")]
    InvalidTransition {
        action: &'static str,
        status: TimerStatus,
    },
}

impl TimerError {
    /// Stable identifier for the rejection reason
    pub fn code(&self) -> &'static str {
        match self {
            TimerError::InvalidDuration => "invalid_duration",
            TimerError::RunningLimitReached { .. } => "running_limit",
            TimerError::FavoritesLimitReached { .. } => "favorites_limit",
            TimerError::PresetNotFound(_) => "preset_not_found",
            TimerError::TimerNotFound(_) => "timer_not_found",
            TimerError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

/// Failure reported by a [`NotificationScheduler`](crate::services::NotificationScheduler).
///
/// Always logged, never propagated into timer state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("failed to schedule alarm {key}: {reason}")]
    Schedule { key: String, reason: String },

    #[error("failed to cancel alarms with prefix {prefix}: {reason}")]
    Cancel { prefix: String, reason: String },
}

pub type Result<T> = std::result::Result<T, TimerError>;
