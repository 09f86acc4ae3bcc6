//! State management module
//! 
//! This module contains the timer and preset entities and the stores that
//! hold them.

pub mod preset;
pub mod preset_store;
pub mod snapshot;
pub mod timer;
pub mod timer_store;

// Re-export main types
pub use preset::{Preset, PresetId};
pub use preset_store::{InMemoryPresetStore, PresetStore};
pub use snapshot::Snapshot;
pub use timer::{EndAction, NewTimer, Timer, TimerDuration, TimerId, TimerStatus};
pub use timer_store::{InMemoryTimerStore, TimerStore};
