//! Tick driver background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::TimerEngine;

/// Background task that advances every running timer once per second
pub async fn tick_driver_task(engine: Arc<TimerEngine>) {
    info!("Starting tick driver task");

    let mut interval = interval(Duration::from_secs(1));
    // After a stall the wall clock is authoritative; bursts of catch-up ticks add nothing
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let completed = engine.tick();
        if !completed.is_empty() {
            debug!("Tick completed {} timer(s): {:?}", completed.len(), completed);
        }
    }
}
