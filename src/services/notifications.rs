//! Notification scheduler boundary and the in-process implementation

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    error::NotificationError,
    utils::{lock, Clock},
};

/// What the user sees when an alarm fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub title: String,
    pub body: String,
    pub sound: Option<String>,
}

/// One fire-once alarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub key: String,
    pub fire_at: DateTime<Utc>,
    pub payload: AlarmPayload,
}

/// Executor of fire-once alarms identified by string keys.
///
/// It knows nothing about timers. Delivery is best effort.
pub trait NotificationScheduler: Send + Sync {
    fn schedule(&self, request: AlarmRequest) -> Result<(), NotificationError>;

    /// Withdraw every alarm whose key starts with `prefix`.
    ///
    /// Pending alarms are withdrawn before this returns; the future resolves
    /// once the scheduler has acknowledged the cancellation.
    fn cancel_prefix(&self, prefix: &str) -> BoxFuture<'static, Result<(), NotificationError>>;
}

/// Scheduler that keeps one sleeping tokio task per alarm and logs the alarm
/// when its time comes.
pub struct LocalAlarmScheduler {
    clock: Arc<dyn Clock>,
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl LocalAlarmScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of alarms that have not fired yet
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl NotificationScheduler for LocalAlarmScheduler {
    fn schedule(&self, request: AlarmRequest) -> Result<(), NotificationError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| NotificationError::Schedule {
            key: request.key.clone(),
            reason: e.to_string(),
        })?;

        let delay = (request.fire_at - self.clock.now()).to_std().unwrap_or_default();
        let pending = Arc::clone(&self.pending);
        let key = request.key.clone();

        // Hold the map lock across spawn so the task cannot remove itself
        // before it has been registered.
        let mut alarms = lock(&self.pending);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            info!(
                key = %request.key,
                sound = ?request.payload.sound,
                "ALARM: {} - {}",
                request.payload.title,
                request.payload.body
            );
            lock(&pending).remove(&request.key);
        });
        if let Some(previous) = alarms.insert(key, handle) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel_prefix(&self, prefix: &str) -> BoxFuture<'static, Result<(), NotificationError>> {
        let mut alarms = lock(&self.pending);
        let before = alarms.len();
        alarms.retain(|key, handle| {
            let matches = key.starts_with(prefix);
            if matches {
                handle.abort();
            }
            !matches
        });
        debug!(prefix, cancelled = before - alarms.len(), "Cancelled alarms");
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;
    use std::time::Duration;

    fn request(key: &str, fire_at: DateTime<Utc>) -> AlarmRequest {
        AlarmRequest {
            key: key.to_string(),
            fire_at,
            payload: AlarmPayload {
                title: "Tea".to_string(),
                body: "Time's up".to_string(),
                sound: None,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn alarms_fire_and_clear_themselves() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = LocalAlarmScheduler::new(clock.clone());
        scheduler.schedule(request("a_0", clock.now() + chrono::Duration::seconds(2))).unwrap();
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_by_prefix_only_touches_matching_keys() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = LocalAlarmScheduler::new(clock.clone());
        let later = clock.now() + chrono::Duration::seconds(60);
        scheduler.schedule(request("a_0", later)).unwrap();
        scheduler.schedule(request("a_1", later)).unwrap();
        scheduler.schedule(request("b_0", later)).unwrap();

        scheduler.cancel_prefix("a").await.unwrap();
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn scheduling_outside_a_runtime_fails() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = LocalAlarmScheduler::new(clock.clone());
        let result = scheduler.schedule(request("a_0", clock.now()));
        assert!(matches!(result, Err(NotificationError::Schedule { .. })));
    }
}
