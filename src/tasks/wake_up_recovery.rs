//! Wake-up recovery background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, Instant};
use tracing::{info, warn};

use crate::{
    engine::{ScenePhase, TimerEngine},
    utils::Clock,
};

const CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Background task that detects host suspension and triggers reconciliation.
///
/// The monotonic clock stops while the machine sleeps, the wall clock does
/// not; a wall-clock jump well past the check interval means ticks were
/// missed and timers may have run out unobserved.
pub async fn wake_up_recovery_task(engine: Arc<TimerEngine>, clock: Arc<dyn Clock>) {
    info!("Starting wake-up recovery task");

    let mut interval = interval(CHECK_INTERVAL);
    let mut last_wall = clock.now();
    let mut last_mono = Instant::now();

    loop {
        interval.tick().await;

        let wall = clock.now();
        let mono = Instant::now();
        if let Some(gap) = suspension_gap(wall - last_wall, mono.duration_since(last_mono)) {
            warn!("System wake-up detected after ~{}s, reconciling timers", gap.as_secs());
            engine.update_scene_phase(ScenePhase::Active).await;
        }
        last_wall = wall;
        last_mono = mono;
    }
}

/// Wall-clock time that passed without the monotonic clock noticing, if
/// it is more than one check interval
fn suspension_gap(wall_elapsed: chrono::Duration, mono_elapsed: Duration) -> Option<Duration> {
    let wall = wall_elapsed.to_std().ok()?;
    let gap = wall.checked_sub(mono_elapsed)?;
    (gap > CHECK_INTERVAL).then_some(gap)
}
