//! User-initiated timer operations

use tracing::{debug, info, warn};

use super::{labels::next_default_label, RetirementOutcome, TimerEngine};
use crate::{
    error::{Result, TimerError},
    state::{EndAction, NewTimer, PresetId, Timer, TimerId, TimerStatus},
    utils::lock,
};

impl TimerEngine {
    /// Create and start a timer from user input
    pub fn add_timer(&self, mut request: NewTimer) -> Result<Timer> {
        let _serial = lock(&self.gate);

        if !request.duration.is_valid() {
            warn!("Rejected timer with zero duration");
            return Err(TimerError::InvalidDuration);
        }
        self.ensure_running_capacity()?;
        if request.end_action == EndAction::Preserve {
            self.ensure_favorite_capacity()?;
        }

        request.label = request.label.trim().to_string();
        if request.label.is_empty() {
            request.label = self.default_label();
        }

        let timer = Timer::running(request, None, self.clock.now());
        self.timers.add(timer.clone());
        self.alarms.schedule(&timer);
        info!(timer_id = %timer.id, label = %timer.label, seconds = timer.total_seconds(), "Timer added");
        Ok(timer)
    }

    /// Start a timer from a saved preset
    pub fn run_timer(&self, preset_id: PresetId) -> Result<Timer> {
        let _serial = lock(&self.gate);

        let Some(preset) = self.presets.get(preset_id) else {
            warn!(%preset_id, "Rejected run of a vanished preset");
            return Err(TimerError::PresetNotFound(preset_id));
        };
        if !preset.duration.is_valid() {
            return Err(TimerError::InvalidDuration);
        }
        self.ensure_running_capacity()?;

        let request = NewTimer {
            label: preset.label.clone(),
            duration: preset.duration,
            sound_enabled: preset.sound_enabled,
            vibration_enabled: preset.vibration_enabled,
            end_action: EndAction::Preserve,
        };
        let now = self.clock.now();
        let timer = Timer::running(request, Some(preset.id), now);
        self.timers.add(timer.clone());
        self.presets.update_last_used(preset.id, now);
        self.alarms.schedule(&timer);
        info!(timer_id = %timer.id, %preset_id, label = %timer.label, "Timer started from preset");
        Ok(timer)
    }

    pub fn pause_timer(&self, id: TimerId) -> Result<Timer> {
        let _serial = lock(&self.gate);
        let mut timer = self.get_timer(id)?;
        if timer.status != TimerStatus::Running {
            return Err(invalid("pause", timer.status));
        }

        let remaining = timer.remaining_at(self.clock.now());
        if remaining == 0 {
            // Ran out before the tick noticed; pausing is moot
            return Ok(self.expire(timer, self.is_active()));
        }

        self.alarms.cancel_detached(id);
        timer.status = TimerStatus::Paused;
        timer.remaining_seconds = remaining;
        self.timers.update(timer.clone());
        info!(timer_id = %id, remaining, "Timer paused");
        Ok(timer)
    }

    /// Continue a paused timer, or start a stopped one from its full duration
    pub fn resume_timer(&self, id: TimerId) -> Result<Timer> {
        let _serial = lock(&self.gate);
        let mut timer = self.get_timer(id)?;
        let seconds = match timer.status {
            TimerStatus::Paused if timer.remaining_seconds > 0 => timer.remaining_seconds,
            TimerStatus::Paused | TimerStatus::Stopped => timer.total_seconds(),
            status => return Err(invalid("resume", status)),
        };

        self.alarms.cancel_detached(id);
        timer.run_for(seconds, self.clock.now());
        self.timers.update(timer.clone());
        self.alarms.schedule(&timer);
        info!(timer_id = %id, seconds, "Timer resumed");
        Ok(timer)
    }

    /// Reset to the full duration without running
    pub fn stop_timer(&self, id: TimerId) -> Result<Timer> {
        let _serial = lock(&self.gate);
        let mut timer = self.get_timer(id)?;
        if timer.status == TimerStatus::Stopped {
            return Err(invalid("stop", timer.status));
        }

        self.alarms.cancel_detached(id);
        self.worker.cancel(id);
        timer.reset_stopped();
        self.timers.update(timer.clone());
        info!(timer_id = %id, "Timer stopped");
        Ok(timer)
    }

    /// Run again from the full duration, abandoning any pending retirement
    pub fn restart_timer(&self, id: TimerId) -> Result<Timer> {
        let _serial = lock(&self.gate);
        let mut timer = self.get_timer(id)?;

        self.alarms.cancel_detached(id);
        self.worker.cancel(id);
        timer.run_for(timer.total_seconds(), self.clock.now());
        self.timers.update(timer.clone());
        self.alarms.schedule(&timer);
        info!(timer_id = %id, "Timer restarted");
        Ok(timer)
    }

    /// Flip between keeping the timer as a favorite and discarding it
    pub fn toggle_favorite(&self, id: TimerId) -> Result<Timer> {
        let _serial = lock(&self.gate);
        let mut timer = self.get_timer(id)?;
        let next = timer.end_action.toggled();

        // A timer launched from a preset already occupies that preset's slot
        if next == EndAction::Preserve && timer.origin_preset_id().is_none() {
            self.ensure_favorite_capacity()?;
        }

        timer.end_action = next;
        self.timers.update(timer.clone());
        debug!(timer_id = %id, end_action = ?next, "End action toggled");
        Ok(timer)
    }

    /// Retire a completed timer now instead of waiting out its grace window
    pub fn user_did_confirm_completion(&self, id: TimerId) -> Result<RetirementOutcome> {
        let _serial = lock(&self.gate);
        if let Some(timer) = self.timers.get(id) {
            if timer.status != TimerStatus::Completed {
                return Err(invalid("confirm", timer.status));
            }
        }
        Ok(self.worker.handle_completion_immediately(id))
    }

    /// Remove a timer now. A completed timer goes through the retirement
    /// decision; any other timer is dropped without touching presets.
    pub fn user_did_request_delete(&self, id: TimerId) -> Result<RetirementOutcome> {
        let _serial = lock(&self.gate);
        match self.timers.get(id) {
            Some(timer) if timer.status != TimerStatus::Completed => {
                self.alarms.cancel_detached(id);
                self.worker.cancel(id);
                self.timers.remove(id);
                info!(timer_id = %id, "Timer deleted");
                Ok(RetirementOutcome::Discarded)
            }
            _ => Ok(self.worker.handle_completion_immediately(id)),
        }
    }

    fn default_label(&self) -> String {
        let timers = self.timers.all();
        let presets = self.presets.all();
        let labels = timers
            .iter()
            .map(|t| t.label.as_str())
            .chain(presets.iter().map(|p| p.label.as_str()));
        next_default_label(labels)
    }
}

fn invalid(action: &'static str, status: TimerStatus) -> TimerError {
    TimerError::InvalidTransition { action, status }
}
