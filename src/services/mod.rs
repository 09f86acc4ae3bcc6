//! External service boundary module
//! 
//! This module contains the notification scheduler boundary and the alarm
//! chain glue the engine uses to talk to it.

pub mod alarms;
pub mod notifications;

// Re-export main types
pub use alarms::{AlarmChain, AlarmSettings};
pub use notifications::{AlarmPayload, AlarmRequest, LocalAlarmScheduler, NotificationScheduler};
