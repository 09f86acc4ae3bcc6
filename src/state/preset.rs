//! Preset entity: a saved, reusable timer template

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Timer, TimerDuration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(Uuid);

impl PresetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PresetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A favorite timer template.
///
/// Hidden presets stay addressable by id so that a timer launched from one
/// can still write back to it on retirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    pub label: String,
    pub duration: TimerDuration,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_hidden: bool,
}

impl Preset {
    pub fn new(label: impl Into<String>, duration: TimerDuration, created_at: DateTime<Utc>) -> Self {
        Self {
            id: PresetId::new(),
            label: label.into(),
            duration,
            sound_enabled: true,
            vibration_enabled: false,
            created_at,
            last_used_at: None,
            is_hidden: false,
        }
    }

    /// Materialize a visible preset from a finished timer's current settings
    pub fn from_timer(timer: &Timer, created_at: DateTime<Utc>) -> Self {
        Self {
            id: PresetId::new(),
            label: timer.label.clone(),
            duration: timer.duration,
            sound_enabled: timer.sound_enabled,
            vibration_enabled: timer.vibration_enabled,
            created_at,
            last_used_at: None,
            is_hidden: false,
        }
    }
}
