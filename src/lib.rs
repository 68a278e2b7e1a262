//! # MuralKit
//!
//! Preview and live-track jobs on a wall plotting robot.
//!
//! ## Architecture
//!
//! MuralKit is organized as a workspace with multiple crates:
//!
//! 1. **muralkit-core** - Errors, events, cancellation, telemetry samples
//! 2. **muralkit-visualizer** - Command parser, path model, renderer, playback engines
//! 3. **muralkit-communication** - Device HTTP client and telemetry poller
//! 4. **muralkit-settings** - UI tuning and its persistence
//! 5. **muralkit** - Job session and the command line tool

pub mod session;

pub use session::{FinishDetector, JobSession, TelemetryUpdate};

pub use muralkit_core::{
    AppEvent, CancelToken, Error, EventBus, EventFilter, JobEvent, NetworkError, ParseError,
    Result, TelemetryEvent, TelemetrySample,
};

pub use muralkit_communication::{
    estimate_feed_rate, DeviceApi, DeviceClient, DeviceStatus, DiagnosticsCache, PollEvent,
    TelemetryPoller,
};

pub use muralkit_settings::{LocalStorage, SettingsError, TuningStore, UiTuning};

pub use muralkit_visualizer::{
    find_start_by_percent, parse_commands, parse_commands_sync, DisplayList, JobStats, JobTimer,
    ManualScheduler, PathModel, Point, ResumePoint, SimulationStatus, TokioFrameScheduler,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// File name for a command stream saved from the device at `now`
pub fn export_file_name<Tz>(now: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("commands_device_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

/// Initialize logging
///
/// Sets up structured logging on stderr with:
/// - RUST_LOG environment variable support, `info` by default
/// - Pretty console formatting, or one JSON object per line with `json`
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(false);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true)
            .pretty();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
