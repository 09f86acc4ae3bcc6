//! Timer Keeper - A multi-timer engine with presets, alarms and retirement
//! 
//! This is the main entry point for the timer-keeper application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use timer_keeper::{
    api::create_router,
    config::Config,
    engine::TimerEngine,
    services::LocalAlarmScheduler,
    state::{InMemoryPresetStore, InMemoryTimerStore, Snapshot},
    tasks::{persistence_task, save_now, tick_driver_task, wake_up_recovery_task},
    utils::{shutdown_signal, Clock, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("timer_keeper={},tower_http=info", config.log_level()))
        .init();

    info!("Starting timer-keeper server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, retire_after={}s, max_running={}, max_favorites={}",
        config.host, config.port, config.retire_after, config.max_running, config.max_favorites
    );

    // Restore persisted state, if any
    let snapshot = match &config.state_file {
        Some(path) => {
            let snapshot = Snapshot::load(path)?;
            info!(
                "Loaded {} timer(s) and {} preset(s) from {}",
                snapshot.timers.len(),
                snapshot.presets.len(),
                path.display()
            );
            snapshot
        }
        None => {
            warn!("No --state-file given, timers will not survive a restart");
            Snapshot::default()
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timers = Arc::new(InMemoryTimerStore::with_timers(snapshot.timers));
    let presets = Arc::new(InMemoryPresetStore::with_presets(snapshot.presets));
    let notifier = Arc::new(LocalAlarmScheduler::new(Arc::clone(&clock)));
    let engine = Arc::new(TimerEngine::new(
        config.engine_config(),
        timers,
        presets,
        notifier,
        Arc::clone(&clock),
    ));

    // Settle whatever happened while we were not running before the first tick
    let report = engine.reconcile_on_launch();
    info!(
        "Launch reconciliation: completed={}, corrected={}, resumed={}, retired={}",
        report.completed, report.corrected, report.resumed, report.retired
    );

    // Start background tasks
    let tick_engine = Arc::clone(&engine);
    tokio::spawn(async move {
        tick_driver_task(tick_engine).await;
    });

    let wake_engine = Arc::clone(&engine);
    let wake_clock = Arc::clone(&clock);
    tokio::spawn(async move {
        wake_up_recovery_task(wake_engine, wake_clock).await;
    });

    if let Some(path) = config.state_file.clone() {
        let persist_engine = Arc::clone(&engine);
        tokio::spawn(async move {
            persistence_task(persist_engine, path).await;
        });
    }

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&engine));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers              - List timers");
    info!("  POST   /timers              - Add and start a timer");
    info!("  GET    /timers/:id          - Get one timer");
    info!("  POST   /timers/:id/<action> - pause, resume, stop, restart, favorite, confirm");
    info!("  DELETE /timers/:id          - Delete a timer");
    info!("  GET    /presets             - List favorite presets");
    info!("  POST   /presets/:id/run     - Start a timer from a preset");
    info!("  POST   /scene-phase         - Report host foreground/background");
    info!("  GET    /health              - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Some(path) = &config.state_file {
        match save_now(&engine, path) {
            Ok(()) => info!("Final snapshot written to {}", path.display()),
            Err(e) => error!("Failed to write final snapshot: {:#}", e),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
