//! Preset store contract and its in-memory implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use super::{Preset, PresetId, Timer};
use crate::utils::lock;

/// Observable collection of presets.
///
/// Presets are never removed, only hidden, so ids stay addressable.
pub trait PresetStore: Send + Sync {
    fn all(&self) -> Vec<Preset>;
    fn get(&self, id: PresetId) -> Option<Preset>;
    fn add(&self, preset: Preset);
    fn add_from_timer(&self, timer: &Timer, at: DateTime<Utc>) -> Preset;
    fn update_label(&self, id: PresetId, label: &str) -> bool;
    fn hide(&self, id: PresetId) -> bool;
    fn update_last_used(&self, id: PresetId, at: DateTime<Utc>) -> bool;
    fn visible_count(&self) -> usize;
    fn subscribe(&self) -> watch::Receiver<Vec<Preset>>;
}

#[derive(Debug)]
pub struct InMemoryPresetStore {
    presets: Mutex<Vec<Preset>>,
    changes_tx: watch::Sender<Vec<Preset>>,
}

impl InMemoryPresetStore {
    pub fn new() -> Self {
        Self::with_presets(Vec::new())
    }

    pub fn with_presets(presets: Vec<Preset>) -> Self {
        let (changes_tx, _) = watch::channel(presets.clone());
        Self {
            presets: Mutex::new(presets),
            changes_tx,
        }
    }

    /// Apply `edit` to one preset and notify if anything changed
    fn modify<F>(&self, id: PresetId, edit: F) -> bool
    where
        F: FnOnce(&mut Preset),
    {
        let mut presets = lock(&self.presets);
        let Some(preset) = presets.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        let before = preset.clone();
        edit(preset);
        if *preset != before {
            self.changes_tx.send_replace(presets.clone());
        }
        true
    }
}

impl Default for InMemoryPresetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetStore for InMemoryPresetStore {
    fn all(&self) -> Vec<Preset> {
        lock(&self.presets).clone()
    }

    fn get(&self, id: PresetId) -> Option<Preset> {
        lock(&self.presets).iter().find(|p| p.id == id).cloned()
    }

    fn add(&self, preset: Preset) {
        let mut presets = lock(&self.presets);
        presets.retain(|p| p.id != preset.id);
        presets.push(preset);
        self.changes_tx.send_replace(presets.clone());
    }

    fn add_from_timer(&self, timer: &Timer, at: DateTime<Utc>) -> Preset {
        let preset = Preset::from_timer(timer, at);
        debug!(preset_id = %preset.id, timer_id = %timer.id, "Creating preset from timer");
        self.add(preset.clone());
        preset
    }

    fn update_label(&self, id: PresetId, label: &str) -> bool {
        self.modify(id, |preset| {
            if preset.label != label {
                preset.label = label.to_string();
            }
        })
    }

    fn hide(&self, id: PresetId) -> bool {
        self.modify(id, |preset| preset.is_hidden = true)
    }

    fn update_last_used(&self, id: PresetId, at: DateTime<Utc>) -> bool {
        self.modify(id, |preset| preset.last_used_at = Some(at))
    }

    fn visible_count(&self) -> usize {
        lock(&self.presets).iter().filter(|p| !p.is_hidden).count()
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Preset>> {
        self.changes_tx.subscribe()
    }
}
