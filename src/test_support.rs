//! Shared test doubles: a controllable clock, a recording notifier and an
//! engine harness wired from in-memory stores.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use futures::future::{self, BoxFuture, FutureExt};

use crate::{
    config::EngineConfig,
    engine::TimerEngine,
    error::NotificationError,
    services::{AlarmRequest, NotificationScheduler},
    state::{InMemoryPresetStore, InMemoryTimerStore, Preset, Timer},
    utils::{lock, Clock},
};

/// Wall clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Notifier that remembers what it was asked to do
#[derive(Default)]
pub struct RecordingNotifier {
    pending: Mutex<Vec<AlarmRequest>>,
    cancelled: Mutex<Vec<String>>,
    fail_schedule: AtomicBool,
    fail_cancel: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_schedules(&self, fail: bool) {
        self.fail_schedule.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    /// Keys scheduled and not cancelled since
    pub fn scheduled_keys(&self) -> Vec<String> {
        lock(&self.pending).iter().map(|r| r.key.clone()).collect()
    }

    pub fn pending_for(&self, prefix: &str) -> usize {
        lock(&self.pending).iter().filter(|r| r.key.starts_with(prefix)).count()
    }

    pub fn cancelled_prefixes(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }
}

impl NotificationScheduler for RecordingNotifier {
    fn schedule(&self, request: AlarmRequest) -> Result<(), NotificationError> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(NotificationError::Schedule {
                key: request.key,
                reason: "refused".to_string(),
            });
        }
        lock(&self.pending).push(request);
        Ok(())
    }

    fn cancel_prefix(&self, prefix: &str) -> BoxFuture<'static, Result<(), NotificationError>> {
        lock(&self.cancelled).push(prefix.to_string());
        if self.fail_cancel.load(Ordering::SeqCst) {
            return future::ready(Err(NotificationError::Cancel {
                prefix: prefix.to_string(),
                reason: "refused".to_string(),
            }))
            .boxed();
        }
        lock(&self.pending).retain(|r| !r.key.starts_with(prefix));
        future::ready(Ok(())).boxed()
    }
}

/// Engine plus handles on everything it was built from
pub struct Harness {
    pub engine: TimerEngine,
    pub timers: Arc<InMemoryTimerStore>,
    pub presets: Arc<InMemoryPresetStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::seeded(EngineConfig::default(), Vec::new(), Vec::new())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::seeded(config, Vec::new(), Vec::new())
    }

    pub fn seeded(config: EngineConfig, timers: Vec<Timer>, presets: Vec<Preset>) -> Self {
        let timers = Arc::new(InMemoryTimerStore::with_timers(timers));
        let presets = Arc::new(InMemoryPresetStore::with_presets(presets));
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new());
        let engine = TimerEngine::new(
            config,
            timers.clone(),
            presets.clone(),
            notifier.clone(),
            clock.clone(),
        );
        Self { engine, timers, presets, notifier, clock }
    }

    /// Move the wall clock and let the engine observe it
    pub fn tick_after(&self, by: Duration) {
        self.clock.advance(by);
        self.engine.tick();
    }
}
