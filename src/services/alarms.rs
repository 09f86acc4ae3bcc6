//! Alarm chain: a bounded burst of spaced notifications per timer
//!
//! A single notification at the deadline cannot ring continuously while the
//! process is suspended, so each timer gets `count` alarms spaced `interval`
//! apart, all keyed under the timer id. The chain is always cancelled as a
//! whole by that prefix because fewer than `count` may have been scheduled.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::notifications::{AlarmPayload, AlarmRequest, NotificationScheduler};
use crate::{
    config::EngineConfig,
    state::{Timer, TimerId},
    utils::Clock,
};

const ALARM_BODY: &str = "Time's up!";
const ALARM_SOUND: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSettings {
    pub count: usize,
    pub interval: Duration,
    pub lead_time: Duration,
}

impl From<&EngineConfig> for AlarmSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            count: config.alarm_count,
            interval: config.alarm_interval,
            lead_time: config.alarm_lead_time,
        }
    }
}

/// Schedules and cancels the alarm burst of a timer against the
/// notification boundary
#[derive(Clone)]
pub struct AlarmChain {
    notifier: Arc<dyn NotificationScheduler>,
    clock: Arc<dyn Clock>,
    settings: AlarmSettings,
}

impl AlarmChain {
    pub fn new(notifier: Arc<dyn NotificationScheduler>, clock: Arc<dyn Clock>, settings: AlarmSettings) -> Self {
        Self { notifier, clock, settings }
    }

    /// Key prefix shared by every alarm of a timer
    pub fn base_id(id: TimerId) -> String {
        id.to_string()
    }

    /// Alarms a timer needs as of `now`; times already in the past are dropped
    pub fn plan(&self, timer: &Timer, now: DateTime<Utc>) -> Vec<AlarmRequest> {
        let lead = to_chrono(self.settings.lead_time);
        let interval = to_chrono(self.settings.interval);
        let first = timer.end_date.max(now + lead);
        let base_id = Self::base_id(timer.id);

        (0..self.settings.count)
            .filter_map(|i| {
                let fire_at = first.checked_add_signed(interval * i32::try_from(i).ok()?)?;
                (fire_at > now).then(|| AlarmRequest {
                    key: format!("{base_id}_{i}"),
                    fire_at,
                    payload: AlarmPayload {
                        title: timer.label.clone(),
                        body: ALARM_BODY.to_string(),
                        sound: timer.sound_enabled.then(|| ALARM_SOUND.to_string()),
                    },
                })
            })
            .collect()
    }

    /// Schedule the whole chain; returns how many alarms were accepted
    pub fn schedule(&self, timer: &Timer) -> usize {
        let requests = self.plan(timer, self.clock.now());
        let planned = requests.len();
        let accepted = requests
            .into_iter()
            .filter(|request| match self.notifier.schedule(request.clone()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(timer_id = %timer.id, "Alarm scheduling failed: {}", e);
                    false
                }
            })
            .count();
        debug!(timer_id = %timer.id, planned, accepted, "Scheduled alarm chain");
        accepted
    }

    /// Cancel every alarm of a timer; failures are logged, not returned
    pub fn cancel(&self, id: TimerId) -> BoxFuture<'static, ()> {
        self.notifier
            .cancel_prefix(&Self::base_id(id))
            .map(move |result| {
                if let Err(e) = result {
                    warn!(timer_id = %id, "Alarm cancellation failed: {}", e);
                }
            })
            .boxed()
    }

    /// Cancel without waiting for the acknowledgement
    pub fn cancel_detached(&self, id: TimerId) {
        let acknowledged = self.cancel(id);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(acknowledged);
        }
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{NewTimer, TimerDuration},
        test_support::{ManualClock, RecordingNotifier},
    };

    fn chain(notifier: Arc<RecordingNotifier>, clock: Arc<ManualClock>, count: usize) -> AlarmChain {
        AlarmChain::new(
            notifier,
            clock,
            AlarmSettings {
                count,
                interval: Duration::from_secs(2),
                lead_time: Duration::from_secs(1),
            },
        )
    }

    #[test]
    fn burst_starts_at_deadline_and_is_spaced() {
        let clock = Arc::new(ManualClock::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let chain = chain(notifier, clock.clone(), 3);
        let timer = Timer::running(NewTimer::new("tea", TimerDuration::new(0, 0, 30)), None, clock.now());

        let plan = chain.plan(&timer, clock.now());
        let offsets: Vec<i64> = plan.iter().map(|r| (r.fire_at - clock.now()).num_seconds()).collect();
        assert_eq!(offsets, vec![30, 32, 34]);
        assert_eq!(plan[0].key, format!("{}_0", timer.id));
        assert_eq!(plan[2].key, format!("{}_2", timer.id));
        assert_eq!(plan[0].payload.sound.as_deref(), Some("default"));
    }

    #[test]
    fn lead_time_pushes_back_an_imminent_deadline() {
        let clock = Arc::new(ManualClock::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let chain = chain(notifier, clock.clone(), 2);
        let mut timer = Timer::running(NewTimer::new("tea", TimerDuration::new(0, 0, 30)), None, clock.now());
        timer.end_date = clock.now() - chrono::Duration::seconds(10);
        timer.sound_enabled = false;

        let plan = chain.plan(&timer, clock.now());
        let offsets: Vec<i64> = plan.iter().map(|r| (r.fire_at - clock.now()).num_seconds()).collect();
        assert_eq!(offsets, vec![1, 3]);
        assert!(plan[0].payload.sound.is_none());
    }

    #[test]
    fn notifier_failures_are_absorbed() {
        let clock = Arc::new(ManualClock::new());
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_schedules(true);
        let chain = chain(notifier.clone(), clock.clone(), 5);
        let timer = Timer::running(NewTimer::new("tea", TimerDuration::new(0, 0, 30)), None, clock.now());

        assert_eq!(chain.schedule(&timer), 0);
        assert!(notifier.scheduled_keys().is_empty());
    }

    #[tokio::test]
    async fn cancellation_uses_the_timer_prefix() {
        let clock = Arc::new(ManualClock::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let chain = chain(notifier.clone(), clock.clone(), 4);
        let timer = Timer::running(NewTimer::new("tea", TimerDuration::new(0, 0, 30)), None, clock.now());

        assert_eq!(chain.schedule(&timer), 4);
        chain.cancel(timer.id).await;
        assert_eq!(notifier.cancelled_prefixes(), vec![timer.id.to_string()]);
        assert!(notifier.scheduled_keys().is_empty());
    }
}
