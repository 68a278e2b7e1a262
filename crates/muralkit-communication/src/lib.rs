//! # MuralKit Communication
//!
//! HTTP access to the plotter firmware: status telemetry, diagnostics and
//! the stored command stream, plus the fixed-interval telemetry poller.

pub mod client;
pub mod diag;
pub mod poller;
pub mod status;

pub use client::{DeviceApi, DeviceClient, COMMANDS_ENDPOINT, DIAG_ENDPOINT, STATUS_ENDPOINT};
pub use diag::{estimate_feed_rate, DeviceDiagnostics, DiagnosticsCache};
pub use poller::{
    PollEvent, PollerHandle, TelemetryPoller, MIN_POLL_INTERVAL_MS, STALE_AFTER_INTERVALS,
};
pub use status::{DeviceStatus, FirmwarePerf};
