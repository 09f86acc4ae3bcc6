//! Timer Keeper - A multi-timer engine with presets, alarms and retirement
//! 
//! This library runs any number of concurrent countdowns against the wall
//! clock, schedules alarm chains for them, and retires completed timers
//! into reusable favorite presets after a short grace period.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{Config, EngineConfig};
pub use engine::TimerEngine;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
