//! # MuralKit Core
//!
//! Shared building blocks for MuralKit: the error taxonomy, cooperative
//! cancellation, tuning constants, the normalized telemetry sample, and the
//! application event bus.

pub mod cancel;
pub mod constants;
pub mod error;
pub mod event_bus;
pub mod telemetry;

pub use cancel::CancelToken;

pub use error::{Error, NetworkError, ParseError, Result, TelemetryError};

pub use event_bus::{
    AppEvent, ErrorEvent, EventBus, EventBusConfig, EventCategory, EventFilter, JobEvent,
    SettingsEvent, SubscriptionId, TelemetryEvent,
};

pub use telemetry::TelemetrySample;
