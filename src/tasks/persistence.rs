//! Snapshot persistence background task

use std::{path::PathBuf, sync::Arc};
use tracing::{debug, error, info};

use crate::{engine::TimerEngine, state::Snapshot};

/// Background task that writes a snapshot after every store change
pub async fn persistence_task(engine: Arc<TimerEngine>, path: PathBuf) {
    info!("Starting persistence task, writing to {}", path.display());

    let mut timers_rx = engine.subscribe_timers();
    let mut presets_rx = engine.subscribe_presets();

    loop {
        tokio::select! {
            changed = timers_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = presets_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let snapshot = Snapshot {
            timers: timers_rx.borrow_and_update().clone(),
            presets: presets_rx.borrow_and_update().clone(),
        };
        // Snapshot::save does blocking file I/O
        let target = path.clone();
        match tokio::task::spawn_blocking(move || snapshot.save(&target)).await {
            Ok(Ok(())) => debug!("Snapshot written"),
            Ok(Err(e)) => error!("Failed to persist snapshot: {:#}", e),
            Err(e) => error!("Snapshot writer panicked: {}", e),
        }
    }

    info!("Stores closed, persistence task exiting");
}

/// Write the engine's current state synchronously, used at shutdown
pub fn save_now(engine: &TimerEngine, path: &std::path::Path) -> anyhow::Result<()> {
    Snapshot {
        timers: engine.timers(),
        presets: engine.presets(),
    }
    .save(path)
}
