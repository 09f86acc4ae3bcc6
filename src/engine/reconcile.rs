//! Clock-driven transitions: the per-second tick, and reconciliation with
//! the wall clock after the engine could not tick (relaunch, resume from
//! background).

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ScenePhase, TimerEngine};
use crate::{
    state::{TimerId, TimerStatus},
    utils::lock,
};

/// What `reconcile_on_launch` did to the persisted timers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LaunchReport {
    /// Running timers whose deadline passed while the process was down
    pub completed: usize,
    /// Running timers whose cached remaining time was corrected
    pub corrected: usize,
    /// Completed timers whose grace window resumed
    pub resumed: usize,
    /// Completed timers whose grace window had already elapsed
    pub retired: usize,
}

impl TimerEngine {
    /// Advance every running timer to the current wall-clock time.
    ///
    /// Returns the timers that completed on this tick.
    pub fn tick(&self) -> Vec<TimerId> {
        let _serial = lock(&self.gate);
        let now = self.clock.now();
        let active = self.is_active();
        let mut completed = Vec::new();

        for mut timer in self.timers.all() {
            if timer.status != TimerStatus::Running {
                continue;
            }
            let remaining = timer.remaining_at(now);
            if remaining > 0 {
                // Unchanged values are not written: writes are what observers see
                if remaining != timer.remaining_seconds {
                    timer.remaining_seconds = remaining;
                    self.timers.update(timer);
                }
                continue;
            }

            if !active {
                debug!(timer_id = %timer.id, "Completed while inactive, retirement deferred");
            }
            completed.push(timer.id);
            self.expire(timer, active);
        }
        completed
    }

    /// React to the host moving between foreground and background.
    ///
    /// Becoming active is when timers that ran out unobserved get their
    /// alarms withdrawn and their retirement countdown started.
    pub async fn update_scene_phase(&self, phase: ScenePhase) {
        let previous = std::mem::replace(&mut *lock(&self.phase), phase);
        debug!(?previous, ?phase, "Scene phase changed");
        if phase != ScenePhase::Active {
            return;
        }

        {
            let mut last = lock(&self.last_activation);
            let now = Instant::now();
            if let Some(at) = *last {
                if now.duration_since(at) < self.config.activation_throttle {
                    debug!("Activation ignored, within throttle window");
                    return;
                }
            }
            *last = Some(now);
        }

        let candidates: Vec<TimerId> = {
            let _serial = lock(&self.gate);
            let now = self.clock.now();
            let tolerance = self.expiry_tolerance();
            self.timers
                .all()
                .into_iter()
                .filter(|t| match t.status {
                    TimerStatus::Completed => true,
                    TimerStatus::Running => t.deadline_passed(now, tolerance),
                    // A paused or stopped timer's end date is stale
                    TimerStatus::Paused | TimerStatus::Stopped => false,
                })
                .map(|t| t.id)
                .collect()
        };
        if candidates.is_empty() {
            return;
        }

        // Every stale alarm is gone before any candidate can be retired
        join_all(candidates.iter().map(|id| self.alarms.cancel(*id))).await;

        let _serial = lock(&self.gate);
        let now = self.clock.now();
        let tolerance = self.expiry_tolerance();
        let mut started = 0;
        for id in candidates {
            // Re-read: anything may have happened while cancellations ran
            let Some(timer) = self.timers.get(id) else {
                continue;
            };
            match timer.status {
                TimerStatus::Running if timer.deadline_passed(now, tolerance) => {
                    self.expire(timer, true);
                    started += 1;
                }
                TimerStatus::Completed
                    if timer.pending_deletion_at.is_none() || !self.worker.is_pending(id) =>
                {
                    self.worker.schedule_completion(id, self.config.retire_after_seconds);
                    started += 1;
                }
                _ => {}
            }
        }
        if started > 0 {
            info!(started, "Started retirement for timers that finished in the background");
        }
    }

    /// Bring persisted timers in line with the wall clock. Run once at
    /// startup, before the first tick.
    pub fn reconcile_on_launch(&self) -> LaunchReport {
        let _serial = lock(&self.gate);
        let now = self.clock.now();
        let grace = self.config.retire_after_seconds;
        let mut report = LaunchReport::default();

        for mut timer in self.timers.all() {
            match timer.status {
                TimerStatus::Running => {
                    let remaining = timer.remaining_at(now);
                    if remaining == 0 {
                        self.expire(timer, true);
                        report.completed += 1;
                    } else if remaining != timer.remaining_seconds {
                        timer.remaining_seconds = remaining;
                        self.timers.update(timer);
                        report.corrected += 1;
                    }
                }
                TimerStatus::Completed => {
                    let since = (now - timer.end_date).num_seconds().max(0).unsigned_abs();
                    if since > grace {
                        self.worker.handle_completion_immediately(timer.id);
                        report.retired += 1;
                    } else {
                        self.worker.schedule_completion(timer.id, grace - since);
                        report.resumed += 1;
                    }
                }
                TimerStatus::Paused | TimerStatus::Stopped => {}
            }
        }

        info!(
            completed = report.completed,
            corrected = report.corrected,
            resumed = report.resumed,
            retired = report.retired,
            "Launch reconciliation done"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        config::EngineConfig,
        engine::RetirementOutcome,
        state::{EndAction, NewTimer, PresetStore, Timer, TimerDuration, TimerStore},
        test_support::{Harness, ManualClock},
        utils::Clock,
    };

    fn secs(n: u32) -> NewTimer {
        NewTimer::new("", TimerDuration::new(0, 0, n))
    }

    /// A timer as it would be read back from disk after `ago` seconds
    fn persisted(clock: &ManualClock, status: TimerStatus, seconds: u32, ended_ago: i64) -> Timer {
        let mut timer = Timer::running(NewTimer::new("saved", TimerDuration::new(0, 0, seconds)), None, clock.now());
        timer.end_date = clock.now() - ChronoDuration::seconds(ended_ago);
        if status == TimerStatus::Completed {
            timer.mark_completed();
        } else {
            timer.status = status;
        }
        timer
    }

    #[tokio::test]
    async fn tick_counts_down_without_redundant_writes() {
        let h = Harness::new();
        let timer = h.engine.add_timer(secs(10)).unwrap();
        let rx = h.engine.subscribe_timers();

        h.tick_after(Duration::from_millis(400));
        assert_eq!(h.timers.get(timer.id).unwrap().remaining_seconds, 10);
        assert!(!rx.has_changed().unwrap());

        h.tick_after(Duration::from_millis(700));
        assert_eq!(h.timers.get(timer.id).unwrap().remaining_seconds, 9);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn running_timer_never_rests_at_zero() {
        let h = Harness::new();
        let timer = h.engine.add_timer(secs(2)).unwrap();

        h.tick_after(Duration::from_secs(1));
        assert_eq!(h.timers.get(timer.id).unwrap().status, TimerStatus::Running);

        let completed = {
            h.clock.advance(Duration::from_secs(1));
            h.engine.tick()
        };
        assert_eq!(completed, vec![timer.id]);
        let stored = h.timers.get(timer.id).unwrap();
        assert_eq!(stored.status, TimerStatus::Completed);
        assert_eq!(stored.remaining_seconds, 0);
        assert!(stored.pending_deletion_at.is_some());
        assert!(h.engine.retirement_pending(timer.id));

        // Completion happens once
        h.tick_after(Duration::from_secs(1));
        assert_eq!(h.engine.tick(), Vec::<TimerId>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_discarded_timer_disappears_after_grace() {
        let h = Harness::new();
        let mut request = NewTimer::new("", TimerDuration::new(0, 0, 1));
        request.vibration_enabled = false;
        let timer = h.engine.add_timer(request).unwrap();
        assert_eq!(timer.label, "Timer 1");
        assert!(timer.sound_enabled);

        h.tick_after(Duration::from_secs(1));
        assert_eq!(h.timers.get(timer.id).unwrap().status, TimerStatus::Completed);
        assert!(h.engine.retirement_pending(timer.id));

        let grace = h.engine.config().retire_after_seconds;
        for _ in 0..grace {
            tokio::time::sleep(Duration::from_secs(1)).await;
            h.tick_after(Duration::from_secs(1));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(h.timers.get(timer.id).is_none());
        assert!(h.presets.all().is_empty());
        assert_eq!(h.notifier.pending_for(&timer.id.to_string()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn toggling_during_grace_turns_the_timer_into_a_preset() {
        let h = Harness::new();
        let timer = h.engine.add_timer(NewTimer::new("Pizza", TimerDuration::new(0, 0, 1))).unwrap();
        h.tick_after(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.engine.toggle_favorite(timer.id).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert!(h.timers.get(timer.id).is_none());
        let presets = h.presets.all();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].label, "Pizza");
    }

    #[tokio::test(start_paused = true)]
    async fn completion_while_inactive_waits_for_activation() {
        let h = Harness::new();
        let timer = h.engine.add_timer(secs(3)).unwrap();
        h.engine.update_scene_phase(ScenePhase::Inactive).await;

        h.tick_after(Duration::from_secs(4));
        let stored = h.timers.get(timer.id).unwrap();
        assert_eq!(stored.status, TimerStatus::Completed);
        assert!(stored.pending_deletion_at.is_none());
        assert!(!h.engine.retirement_pending(timer.id));

        h.engine.update_scene_phase(ScenePhase::Active).await;
        assert!(h.engine.retirement_pending(timer.id));
        assert!(h.notifier.cancelled_prefixes().contains(&timer.id.to_string()));
        assert_eq!(h.notifier.pending_for(&timer.id.to_string()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn activation_picks_up_timers_that_expired_without_ticks() {
        let h = Harness::new();
        let expired = h.engine.add_timer(secs(5)).unwrap();
        let fresh = h.engine.add_timer(secs(60)).unwrap();
        let paused = h.engine.add_timer(secs(5)).unwrap();
        h.engine.pause_timer(paused.id).unwrap();

        h.engine.update_scene_phase(ScenePhase::Inactive).await;
        h.clock.advance(Duration::from_secs(30));
        h.engine.update_scene_phase(ScenePhase::Active).await;

        let stored = h.timers.get(expired.id).unwrap();
        assert_eq!(stored.status, TimerStatus::Completed);
        assert!(h.engine.retirement_pending(expired.id));
        assert_eq!(h.timers.get(fresh.id).unwrap().status, TimerStatus::Running);
        assert_eq!(h.timers.get(paused.id).unwrap().status, TimerStatus::Paused);
        assert!(h.notifier.pending_for(&fresh.id.to_string()) > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn activation_within_tolerance_counts_as_expired() {
        let h = Harness::new();
        let timer = h.engine.add_timer(secs(5)).unwrap();
        h.clock.advance(Duration::from_millis(4_700));
        h.engine.update_scene_phase(ScenePhase::Active).await;
        assert_eq!(h.timers.get(timer.id).unwrap().status, TimerStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_activations_are_debounced() {
        let h = Harness::new();
        h.engine.update_scene_phase(ScenePhase::Active).await;

        let timer = h.engine.add_timer(secs(1)).unwrap();
        h.engine.update_scene_phase(ScenePhase::Inactive).await;
        h.tick_after(Duration::from_secs(2));

        tokio::time::advance(Duration::from_millis(300)).await;
        h.engine.update_scene_phase(ScenePhase::Active).await;
        assert!(!h.engine.retirement_pending(timer.id));

        tokio::time::advance(Duration::from_secs(1)).await;
        h.engine.update_scene_phase(ScenePhase::Active).await;
        assert!(h.engine.retirement_pending(timer.id));
    }

    #[tokio::test(start_paused = true)]
    async fn activation_leaves_live_countdowns_alone() {
        let h = Harness::new();
        let timer = h.engine.add_timer(secs(1)).unwrap();
        h.tick_after(Duration::from_secs(1));
        let before = h.timers.get(timer.id).unwrap().pending_deletion_at;

        h.clock.advance(Duration::from_secs(2));
        h.engine.update_scene_phase(ScenePhase::Active).await;
        assert_eq!(h.timers.get(timer.id).unwrap().pending_deletion_at, before);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_failures_do_not_block_reconciliation() {
        let h = Harness::new();
        h.notifier.fail_cancels(true);
        let timer = h.engine.add_timer(secs(1)).unwrap();
        h.engine.update_scene_phase(ScenePhase::Inactive).await;
        h.tick_after(Duration::from_secs(2));

        h.engine.update_scene_phase(ScenePhase::Active).await;
        assert!(h.engine.retirement_pending(timer.id));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_completes_overdue_running_timers() {
        let clock = ManualClock::new();
        let overdue = persisted(&clock, TimerStatus::Running, 30, 120);
        let h = Harness::seeded(EngineConfig::default(), vec![overdue.clone()], Vec::new());

        let report = h.engine.reconcile_on_launch();
        assert_eq!(report.completed, 1);
        let stored = h.timers.get(overdue.id).unwrap();
        assert_eq!(stored.status, TimerStatus::Completed);
        assert_eq!(stored.remaining_seconds, 0);
        assert!(h.engine.retirement_pending(overdue.id));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_corrects_stale_remaining_time() {
        let clock = ManualClock::new();
        let mut running = persisted(&clock, TimerStatus::Running, 60, -40);
        running.remaining_seconds = 60;
        let paused = persisted(&clock, TimerStatus::Paused, 60, 500);
        let h = Harness::seeded(EngineConfig::default(), vec![running.clone(), paused.clone()], Vec::new());

        let report = h.engine.reconcile_on_launch();
        assert_eq!(report, LaunchReport { corrected: 1, ..LaunchReport::default() });
        assert_eq!(h.timers.get(running.id).unwrap().remaining_seconds, 40);
        assert_eq!(h.timers.get(paused.id).unwrap(), paused);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_retires_or_resumes_completed_timers() {
        let clock = ManualClock::new();
        let mut stale = persisted(&clock, TimerStatus::Completed, 30, 60);
        stale.end_action = EndAction::Preserve;
        let recent = persisted(&clock, TimerStatus::Completed, 30, 2);
        let h = Harness::seeded(EngineConfig::default(), vec![stale.clone(), recent.clone()], Vec::new());
        let mut events = h.engine.subscribe_retirements();

        let report = h.engine.reconcile_on_launch();
        assert_eq!(report.retired, 1);
        assert_eq!(report.resumed, 1);
        assert!(h.timers.get(stale.id).is_none());
        assert_eq!(h.presets.all().len(), 1);
        assert!(h.engine.retirement_pending(recent.id));

        // The remaining three seconds of grace, not a fresh five
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert!(h.timers.get(recent.id).is_none());

        let mut outcomes = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let crate::engine::RetirementEvent::Completed { outcome, .. } = event {
                outcomes.push(outcome);
            }
        }
        assert!(matches!(outcomes[0], RetirementOutcome::SavedAsPreset(_)));
        assert_eq!(outcomes[1], RetirementOutcome::Discarded);
    }
}
