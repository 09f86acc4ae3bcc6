//! Timer entity: one labeled countdown and its lifecycle fields

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PresetId;

/// Opaque unique identity of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Stopped,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerStatus::Stopped => "stopped",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// What the user currently wants to happen once the timer finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndAction {
    /// Become (or return to) a favorite preset
    Preserve,
    /// Delete the timer, hiding its origin preset if any
    #[default]
    Discard,
}

impl EndAction {
    pub fn toggled(self) -> Self {
        match self {
            EndAction::Preserve => EndAction::Discard,
            EndAction::Discard => EndAction::Preserve,
        }
    }
}

/// Configured countdown length as entered by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerDuration {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimerDuration {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self { hours, minutes, seconds }
    }

    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: u32::try_from(total / 3600).unwrap_or(u32::MAX),
            minutes: ((total % 3600) / 60) as u32,
            seconds: (total % 60) as u32,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    pub fn is_valid(&self) -> bool {
        self.total_seconds() > 0
    }
}

/// User-supplied parameters for a new timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimer {
    #[serde(default)]
    pub label: String,
    pub duration: TimerDuration,
    #[serde(default = "enabled")]
    pub sound_enabled: bool,
    #[serde(default)]
    pub vibration_enabled: bool,
    #[serde(default)]
    pub end_action: EndAction,
}

fn enabled() -> bool {
    true
}

impl NewTimer {
    pub fn new(label: impl Into<String>, duration: TimerDuration) -> Self {
        Self {
            label: label.into(),
            duration,
            sound_enabled: true,
            vibration_enabled: false,
            end_action: EndAction::Discard,
        }
    }
}

/// A single countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub label: String,
    pub duration: TimerDuration,
    pub created_at: DateTime<Utc>,
    /// Wall-clock deadline; only meaningful while running or completed
    pub end_date: DateTime<Utc>,
    pub remaining_seconds: u64,
    pub status: TimerStatus,
    /// Set once a completed timer enters its grace countdown
    pub pending_deletion_at: Option<DateTime<Utc>>,
    origin_preset_id: Option<PresetId>,
    pub end_action: EndAction,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
}

impl Timer {
    /// Build a timer that starts counting down at `now`
    pub fn running(request: NewTimer, origin_preset_id: Option<PresetId>, now: DateTime<Utc>) -> Self {
        let total = request.duration.total_seconds();
        Self {
            id: TimerId::new(),
            label: request.label,
            duration: request.duration,
            created_at: now,
            end_date: deadline(now, total),
            remaining_seconds: total,
            status: TimerStatus::Running,
            pending_deletion_at: None,
            origin_preset_id,
            end_action: request.end_action,
            sound_enabled: request.sound_enabled,
            vibration_enabled: request.vibration_enabled,
        }
    }

    pub fn origin_preset_id(&self) -> Option<PresetId> {
        self.origin_preset_id
    }

    pub fn total_seconds(&self) -> u64 {
        self.duration.total_seconds()
    }

    /// Whole seconds left until `end_date`, rounded up and clamped at zero
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.end_date - now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    /// Whether the deadline has passed, counting anything within
    /// `tolerance` of it as passed
    pub fn deadline_passed(&self, now: DateTime<Utc>, tolerance: ChronoDuration) -> bool {
        self.end_date <= now + tolerance
    }

    /// Timers without an origin that will be turned into a new preset
    pub fn heading_to_new_preset(&self) -> bool {
        self.origin_preset_id.is_none() && self.end_action == EndAction::Preserve
    }

    pub fn mark_completed(&mut self) {
        self.status = TimerStatus::Completed;
        self.remaining_seconds = 0;
    }

    /// Start counting down `seconds` from `now`
    pub fn run_for(&mut self, seconds: u64, now: DateTime<Utc>) {
        self.status = TimerStatus::Running;
        self.remaining_seconds = seconds;
        self.end_date = deadline(now, seconds);
        self.pending_deletion_at = None;
    }

    /// Reset to the full configured duration without running
    pub fn reset_stopped(&mut self) {
        self.status = TimerStatus::Stopped;
        self.remaining_seconds = self.total_seconds();
        self.pending_deletion_at = None;
    }
}

pub(crate) fn deadline(from: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    let span = i64::try_from(seconds)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .unwrap_or(ChronoDuration::MAX);
    from.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
