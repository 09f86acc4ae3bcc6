//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "timer-keeper")]
#[command(about = "Countdown timers with favorites, grace-period retirement and alarms")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// JSON file the timers and presets are persisted to
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Seconds a completed timer waits before it is retired
    #[arg(long, default_value = "5")]
    pub retire_after: u64,

    /// Maximum number of simultaneously running timers
    #[arg(long, default_value = "10")]
    pub max_running: usize,

    /// Maximum number of favorites (visible presets plus timers about to become one)
    #[arg(long, default_value = "20")]
    pub max_favorites: usize,

    /// Number of alarm notifications scheduled per timer
    #[arg(long, default_value = "60")]
    pub alarm_count: usize,

    /// Spacing between alarm notifications in milliseconds
    #[arg(long, default_value = "2000")]
    pub alarm_interval_ms: u64,

    /// Minimum lead time before the first alarm notification in milliseconds
    #[arg(long, default_value = "1000")]
    pub alarm_lead_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Engine tunables derived from the command line
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            retire_after_seconds: self.retire_after,
            max_running_timers: self.max_running,
            max_favorites: self.max_favorites,
            alarm_count: self.alarm_count,
            alarm_interval: Duration::from_millis(self.alarm_interval_ms),
            alarm_lead_time: Duration::from_millis(self.alarm_lead_ms),
            ..EngineConfig::default()
        }
    }
}

/// Tunables of the timer lifecycle engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Grace window between completion and retirement
    pub retire_after_seconds: u64,
    pub max_running_timers: usize,
    pub max_favorites: usize,
    pub alarm_count: usize,
    pub alarm_interval: Duration,
    pub alarm_lead_time: Duration,
    /// Activations closer together than this are ignored
    pub activation_throttle: Duration,
    /// Slack applied when deciding a deadline has passed
    pub expiry_tolerance: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retire_after_seconds: 5,
            max_running_timers: 10,
            max_favorites: 20,
            alarm_count: 60,
            alarm_interval: Duration::from_secs(2),
            alarm_lead_time: Duration::from_secs(1),
            activation_throttle: Duration::from_millis(800),
            expiry_tolerance: Duration::from_millis(500),
        }
    }
}
