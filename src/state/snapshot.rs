//! JSON snapshot of both stores, written on change and read at launch

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Preset, Timer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub timers: Vec<Timer>,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl Snapshot {
    /// Read a snapshot; a missing file yields an empty one
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        info!(
            "Loaded snapshot with {} timers and {} presets",
            snapshot.timers.len(),
            snapshot.presets.len()
        );
        Ok(snapshot)
    }

    /// Write atomically through a sibling temp file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to encode snapshot")?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, raw)
            .with_context(|| format!("Failed to write snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace snapshot {}", path.display()))?;
        Ok(())
    }
}
