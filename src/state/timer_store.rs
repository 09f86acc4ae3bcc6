//! Timer store contract and its in-memory implementation

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

use super::{Timer, TimerId};
use crate::utils::lock;

/// Observable collection of timers keyed by id.
///
/// Implementations serialize their own writes and notify subscribers only
/// after a write has been applied.
pub trait TimerStore: Send + Sync {
    fn all(&self) -> Vec<Timer>;
    fn get(&self, id: TimerId) -> Option<Timer>;
    fn add(&self, timer: Timer);
    /// Replace the stored timer with the same id; returns false if absent
    fn update(&self, timer: Timer) -> bool;
    fn remove(&self, id: TimerId) -> Option<Timer>;
    fn subscribe(&self) -> watch::Receiver<Vec<Timer>>;
}

/// Timer store held in process memory
#[derive(Debug)]
pub struct InMemoryTimerStore {
    timers: Mutex<Vec<Timer>>,
    changes_tx: watch::Sender<Vec<Timer>>,
}

impl InMemoryTimerStore {
    pub fn new() -> Self {
        Self::with_timers(Vec::new())
    }

    /// Seed the store, e.g. from a persisted snapshot
    pub fn with_timers(timers: Vec<Timer>) -> Self {
        let (changes_tx, _) = watch::channel(timers.clone());
        Self {
            timers: Mutex::new(timers),
            changes_tx,
        }
    }

    fn publish(&self, timers: &[Timer]) {
        // send_replace never fails, even with no receivers alive
        self.changes_tx.send_replace(timers.to_vec());
    }
}

impl Default for InMemoryTimerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerStore for InMemoryTimerStore {
    fn all(&self) -> Vec<Timer> {
        lock(&self.timers).clone()
    }

    fn get(&self, id: TimerId) -> Option<Timer> {
        lock(&self.timers).iter().find(|t| t.id == id).cloned()
    }

    fn add(&self, timer: Timer) {
        let mut timers = lock(&self.timers);
        debug!(timer_id = %timer.id, "Storing timer");
        match timers.iter_mut().find(|t| t.id == timer.id) {
            Some(existing) => *existing = timer,
            None => timers.push(timer),
        }
        self.publish(&timers);
    }

    fn update(&self, timer: Timer) -> bool {
        let mut timers = lock(&self.timers);
        let Some(existing) = timers.iter_mut().find(|t| t.id == timer.id) else {
            return false;
        };
        if *existing != timer {
            *existing = timer;
            self.publish(&timers);
        }
        true
    }

    fn remove(&self, id: TimerId) -> Option<Timer> {
        let mut timers = lock(&self.timers);
        let index = timers.iter().position(|t| t.id == id)?;
        let removed = timers.remove(index);
        debug!(timer_id = %id, "Removed timer");
        self.publish(&timers);
        Some(removed)
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Timer>> {
        self.changes_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{NewTimer, TimerDuration};
    use chrono::Utc;

    fn sample(label: &str) -> Timer {
        Timer::running(NewTimer::new(label, TimerDuration::new(0, 0, 30)), None, Utc::now())
    }

    #[test]
    fn add_get_remove() {
        let store = InMemoryTimerStore::new();
        let timer = sample("pasta");
        store.add(timer.clone());

        assert_eq!(store.get(timer.id), Some(timer.clone()));
        assert_eq!(store.remove(timer.id), Some(timer.clone()));
        assert!(store.get(timer.id).is_none());
        assert!(store.remove(timer.id).is_none());
    }

    #[test]
    fn update_requires_existing_entry() {
        let store = InMemoryTimerStore::new();
        let mut timer = sample("pasta");
        assert!(!store.update(timer.clone()));

        store.add(timer.clone());
        timer.label = "rice".to_string();
        assert!(store.update(timer.clone()));
        assert_eq!(store.get(timer.id).map(|t| t.label), Some("rice".to_string()));
    }

    #[test]
    fn identical_update_does_not_notify() {
        let store = InMemoryTimerStore::new();
        let timer = sample("pasta");
        store.add(timer.clone());

        let rx = store.subscribe();
        assert!(store.update(timer.clone()));
        assert!(!rx.has_changed().unwrap());

        let mut edited = timer;
        edited.remaining_seconds -= 1;
        store.update(edited);
        assert!(rx.has_changed().unwrap());
    }
}
