//! Timer lifecycle engine
//!
//! The engine is the single owner of timer state transitions. All mutation
//! goes through one gate: user operations, the 1 Hz tick and the tail of
//! every retirement countdown take it before touching the stores, and
//! nothing holds it across an `.await`.
//!
//! ```text
//! stopped --start/resume--> running --reaches 0--> completed --grace or forced--> removed
//! running --pause--> paused --resume--> running
//! running/paused/completed --stop--> stopped
//! completed --restart--> running
//! ```

pub mod labels;
mod operations;
mod reconcile;
pub mod retirement;

use std::sync::{Arc, Mutex};

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, watch},
    time::Instant,
};
use tracing::{info, warn};

use crate::{
    config::EngineConfig,
    error::{Result, TimerError},
    services::{AlarmChain, AlarmSettings, NotificationScheduler},
    state::{Preset, PresetStore, Timer, TimerId, TimerStatus, TimerStore},
    utils::{lock, Clock},
};

pub use reconcile::LaunchReport;
pub use retirement::{RetirementEvent, RetirementOutcome, RetirementWorker};

/// Whether the host is in the foreground and able to run countdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenePhase {
    #[default]
    Active,
    Inactive,
}

pub struct TimerEngine {
    config: EngineConfig,
    timers: Arc<dyn TimerStore>,
    presets: Arc<dyn PresetStore>,
    alarms: AlarmChain,
    clock: Arc<dyn Clock>,
    worker: RetirementWorker,
    gate: Arc<Mutex<()>>,
    phase: Mutex<ScenePhase>,
    last_activation: Mutex<Option<Instant>>,
}

impl TimerEngine {
    pub fn new(
        config: EngineConfig,
        timers: Arc<dyn TimerStore>,
        presets: Arc<dyn PresetStore>,
        notifier: Arc<dyn NotificationScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gate = Arc::new(Mutex::new(()));
        let alarms = AlarmChain::new(notifier, Arc::clone(&clock), AlarmSettings::from(&config));
        let worker = RetirementWorker::new(
            Arc::clone(&timers),
            Arc::clone(&presets),
            alarms.clone(),
            Arc::clone(&clock),
            Arc::clone(&gate),
        );

        Self {
            config,
            timers,
            presets,
            alarms,
            clock,
            worker,
            gate,
            phase: Mutex::new(ScenePhase::Active),
            last_activation: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timers(&self) -> Vec<Timer> {
        self.timers.all()
    }

    pub fn timer(&self, id: TimerId) -> Option<Timer> {
        self.timers.get(id)
    }

    pub fn presets(&self) -> Vec<Preset> {
        self.presets.all()
    }

    pub fn subscribe_timers(&self) -> watch::Receiver<Vec<Timer>> {
        self.timers.subscribe()
    }

    pub fn subscribe_presets(&self) -> watch::Receiver<Vec<Preset>> {
        self.presets.subscribe()
    }

    pub fn subscribe_retirements(&self) -> broadcast::Receiver<RetirementEvent> {
        self.worker.subscribe()
    }

    pub fn scene_phase(&self) -> ScenePhase {
        *lock(&self.phase)
    }

    /// Whether a grace countdown is outstanding for the timer
    pub fn retirement_pending(&self, id: TimerId) -> bool {
        self.worker.is_pending(id)
    }

    fn is_active(&self) -> bool {
        self.scene_phase() == ScenePhase::Active
    }

    fn get_timer(&self, id: TimerId) -> Result<Timer> {
        self.timers.get(id).ok_or(TimerError::TimerNotFound(id))
    }

    fn expiry_tolerance(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.config.expiry_tolerance).unwrap_or_else(|_| ChronoDuration::zero())
    }

    fn ensure_running_capacity(&self) -> Result<()> {
        let running = self
            .timers
            .all()
            .iter()
            .filter(|t| t.status == TimerStatus::Running)
            .count();
        if running >= self.config.max_running_timers {
            warn!(running, limit = self.config.max_running_timers, "Running timer limit reached");
            return Err(TimerError::RunningLimitReached {
                limit: self.config.max_running_timers,
            });
        }
        Ok(())
    }

    /// Visible presets plus timers that will become new presets
    fn ensure_favorite_capacity(&self) -> Result<()> {
        let upcoming = self.timers.all().iter().filter(|t| t.heading_to_new_preset()).count();
        let favorites = self.presets.visible_count() + upcoming;
        if favorites >= self.config.max_favorites {
            warn!(favorites, limit = self.config.max_favorites, "Favorites limit reached");
            return Err(TimerError::FavoritesLimitReached {
                limit: self.config.max_favorites,
            });
        }
        Ok(())
    }

    /// Flip a timer to completed and, when the host can run countdowns,
    /// start its grace countdown. Caller holds the gate.
    fn expire(&self, mut timer: Timer, start_countdown: bool) -> Timer {
        timer.mark_completed();
        self.timers.update(timer.clone());
        info!(timer_id = %timer.id, label = %timer.label, "Timer completed");

        if start_countdown {
            self.worker.schedule_completion(timer.id, self.config.retire_after_seconds);
            // Re-read: scheduling stamps pending_deletion_at
            return self.timers.get(timer.id).unwrap_or(timer);
        }
        timer
    }
}
