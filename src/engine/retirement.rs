//! Completion retirement worker
//!
//! Owns the grace countdown between a timer completing and its retirement,
//! and decides what retirement means for that timer:
//!
//! ```text
//! origin preset | end action | effect
//! --------------+------------+-----------------------------------------
//! none          | preserve   | new preset from the timer, timer removed
//! none          | discard    | timer removed
//! some(p)       | preserve   | label written back to p, timer removed
//! some(p)       | discard    | p hidden, timer removed
//! ```
//!
//! At most one countdown exists per timer. Scheduling always cancels the
//! previous one, and a cancelled countdown never reaches the decision.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    services::AlarmChain,
    state::{timer::deadline, EndAction, PresetId, PresetStore, TimerId, TimerStatus, TimerStore},
    utils::{lock, Clock},
};

/// Which branch of the retirement decision ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "preset_id", rename_all = "snake_case")]
pub enum RetirementOutcome {
    SavedAsPreset(PresetId),
    ReturnedToPreset(PresetId),
    PresetHidden(PresetId),
    Discarded,
    /// The timer was already gone when the decision ran
    AlreadyRetired,
    /// The countdown was cancelled before it ran out
    Cancelled,
}

/// Progress of grace countdowns, for "retiring in N s" displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RetirementEvent {
    Tick {
        timer_id: TimerId,
        remaining_seconds: u64,
    },
    Completed {
        timer_id: TimerId,
        outcome: RetirementOutcome,
    },
}

struct Countdown {
    generation: u64,
    token: CancellationToken,
}

struct WorkerShared {
    timers: Arc<dyn TimerStore>,
    presets: Arc<dyn PresetStore>,
    alarms: AlarmChain,
    clock: Arc<dyn Clock>,
    /// Serialization shared with the engine; held whenever stores are mutated
    gate: Arc<Mutex<()>>,
    countdowns: Mutex<HashMap<TimerId, Countdown>>,
    next_generation: AtomicU64,
    events_tx: broadcast::Sender<RetirementEvent>,
}

/// Handle on the retirement machinery; cheap to clone.
///
/// Apart from the countdown tasks themselves, every method expects to be
/// called while the engine's gate is held.
#[derive(Clone)]
pub struct RetirementWorker {
    shared: Arc<WorkerShared>,
}

impl RetirementWorker {
    pub fn new(
        timers: Arc<dyn TimerStore>,
        presets: Arc<dyn PresetStore>,
        alarms: AlarmChain,
        clock: Arc<dyn Clock>,
        gate: Arc<Mutex<()>>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            shared: Arc::new(WorkerShared {
                timers,
                presets,
                alarms,
                clock,
                gate,
                countdowns: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                events_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RetirementEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Whether a countdown is outstanding for this timer
    pub fn is_pending(&self, id: TimerId) -> bool {
        lock(&self.shared.countdowns).contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.shared.countdowns).len()
    }

    /// Start the grace countdown for a completed timer, replacing any
    /// countdown already running for it
    pub fn schedule_completion(&self, id: TimerId, after_seconds: u64) {
        self.cancel(id);

        let shared = &self.shared;
        if let Some(mut timer) = shared.timers.get(id) {
            if timer.status == TimerStatus::Completed {
                timer.pending_deletion_at = Some(deadline(shared.clock.now(), after_seconds));
                shared.timers.update(timer);
            }
        }

        let generation = shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        lock(&shared.countdowns).insert(
            id,
            Countdown {
                generation,
                token: token.clone(),
            },
        );

        info!(timer_id = %id, after_seconds, "Retirement countdown started");
        let worker = self.clone();
        tokio::spawn(async move {
            worker.count_down(id, after_seconds, &token).await;
            worker.finish(id, generation);
        });
    }

    /// Stop the countdown for a timer, if any. Safe to call repeatedly.
    pub fn cancel(&self, id: TimerId) -> bool {
        match lock(&self.shared.countdowns).remove(&id) {
            Some(countdown) => {
                countdown.token.cancel();
                debug!(timer_id = %id, "Retirement countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Retire now, superseding any countdown in flight
    pub fn handle_completion_immediately(&self, id: TimerId) -> RetirementOutcome {
        self.cancel(id);
        self.handle(id)
    }

    /// Returns once the countdown ran out or was cancelled
    async fn count_down(&self, id: TimerId, seconds: u64, token: &CancellationToken) {
        for elapsed in 1..=seconds {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    // No subscribers is fine
                    let _ = self.shared.events_tx.send(RetirementEvent::Tick {
                        timer_id: id,
                        remaining_seconds: seconds - elapsed,
                    });
                }
            }
        }
    }

    fn finish(&self, id: TimerId, generation: u64) {
        let _serial = lock(&self.shared.gate);

        // Decided under the gate so a concurrent cancel either happened
        // before (and wins) or cannot happen until the decision is done.
        let still_current = {
            let mut countdowns = lock(&self.shared.countdowns);
            let current = countdowns
                .get(&id)
                .is_some_and(|c| c.generation == generation && !c.token.is_cancelled());
            if current {
                countdowns.remove(&id);
            }
            current
        };

        if still_current {
            self.handle(id);
        } else {
            self.complete_cancelled(id);
        }
    }

    /// The retirement decision, made from the timer as it is right now
    fn handle(&self, id: TimerId) -> RetirementOutcome {
        let shared = &self.shared;
        let Some(timer) = shared.timers.get(id) else {
            debug!(timer_id = %id, "Timer already retired");
            self.on_complete(id, RetirementOutcome::AlreadyRetired);
            return RetirementOutcome::AlreadyRetired;
        };

        let outcome = match (timer.origin_preset_id(), timer.end_action) {
            (None, EndAction::Preserve) => {
                let preset = shared.presets.add_from_timer(&timer, shared.clock.now());
                RetirementOutcome::SavedAsPreset(preset.id)
            }
            (None, EndAction::Discard) => RetirementOutcome::Discarded,
            (Some(preset_id), EndAction::Preserve) => {
                if !shared.presets.update_label(preset_id, &timer.label) {
                    warn!(timer_id = %id, %preset_id, "Origin preset missing, label not written back");
                }
                RetirementOutcome::ReturnedToPreset(preset_id)
            }
            (Some(preset_id), EndAction::Discard) => {
                if !shared.presets.hide(preset_id) {
                    warn!(timer_id = %id, %preset_id, "Origin preset missing, nothing to hide");
                }
                RetirementOutcome::PresetHidden(preset_id)
            }
        };

        shared.timers.remove(id);
        info!(timer_id = %id, label = %timer.label, ?outcome, "Timer retired");
        self.on_complete(id, outcome);
        outcome
    }

    fn on_complete(&self, id: TimerId, outcome: RetirementOutcome) {
        self.shared.alarms.cancel_detached(id);
        let _ = self.shared.events_tx.send(RetirementEvent::Completed {
            timer_id: id,
            outcome,
        });
    }

    /// Cancellation path: the retirement was handled elsewhere, only clear
    /// the bookkeeping unless a newer countdown has taken over
    fn complete_cancelled(&self, id: TimerId) {
        let shared = &self.shared;
        if !self.is_pending(id) {
            if let Some(mut timer) = shared.timers.get(id) {
                if timer.pending_deletion_at.take().is_some() {
                    shared.timers.update(timer);
                }
            }
        }
        debug!(timer_id = %id, "Countdown ended by cancellation");
        let _ = shared.events_tx.send(RetirementEvent::Completed {
            timer_id: id,
            outcome: RetirementOutcome::Cancelled,
        });
    }
}
