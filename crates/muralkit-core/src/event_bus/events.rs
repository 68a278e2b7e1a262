//! Event type definitions for the event bus.
//!
//! This module defines all application events organized by category.
//! Events are designed to be cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;

/// Root event enum for all application events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Job lifecycle events
    Job(JobEvent),
    /// Device telemetry events
    Telemetry(TelemetryEvent),
    /// Settings and configuration
    Settings(SettingsEvent),
    /// Error and diagnostic events
    Error(ErrorEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Job(_) => EventCategory::Job,
            AppEvent::Telemetry(_) => EventCategory::Telemetry,
            AppEvent::Settings(_) => EventCategory::Settings,
            AppEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Job(e) => e.description(),
            AppEvent::Telemetry(e) => e.description(),
            AppEvent::Settings(e) => e.description(),
            AppEvent::Error(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Job lifecycle events.
    Job,
    /// Device telemetry events.
    Telemetry,
    /// Settings and configuration events.
    Settings,
    /// Error and diagnostic events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Job => write!(f, "Job"),
            EventCategory::Telemetry => write!(f, "Telemetry"),
            EventCategory::Settings => write!(f, "Settings"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Job lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// A command stream was parsed and installed.
    ModelLoaded {
        /// Effective total distance in millimeters.
        total_distance_mm: f64,
        /// Total declared by the stream header (0 when absent).
        header_total_mm: f64,
        /// Source lines after the header.
        line_count: usize,
        /// Number of drawable segments.
        segment_count: usize,
    },
    /// The device started drawing.
    Started {
        /// Source line the job resumes from.
        start_line: usize,
        /// Cumulative distance the job resumes from, in millimeters.
        start_dist_mm: f64,
        /// Effective total distance of the loaded model, if any.
        total_distance_mm: Option<f64>,
    },
    /// Job tracking stopped (user stop or telemetry shut down).
    Stopped,
    /// The device reported the job as complete.
    Finished {
        /// Last reported progress in percent.
        progress: f64,
    },
}

impl JobEvent {
    fn description(&self) -> String {
        match self {
            JobEvent::ModelLoaded {
                total_distance_mm,
                line_count,
                segment_count,
                ..
            } => format!(
                "Model loaded: {} lines, {} moves, {:.2}m",
                line_count,
                segment_count,
                total_distance_mm / 1000.0
            ),
            JobEvent::Started {
                start_line,
                start_dist_mm,
                ..
            } => format!(
                "Job started at line {} ({:.1}mm)",
                start_line, start_dist_mm
            ),
            JobEvent::Stopped => "Job stopped".to_string(),
            JobEvent::Finished { progress } => format!("Job finished at {:.0}%", progress),
        }
    }
}

/// Telemetry events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A status sample arrived.
    Sample(TelemetrySample),
    /// A status fetch failed; polling continues.
    FetchFailed {
        /// Error message describing the failure.
        reason: String,
    },
}

impl TelemetryEvent {
    fn description(&self) -> String {
        match self {
            TelemetryEvent::Sample(sample) => match sample.progress_percent() {
                Some(p) => format!(
                    "Telemetry: {:.0}%{}",
                    p,
                    if sample.paused { " (paused)" } else { "" }
                ),
                None => "Telemetry: no progress".to_string(),
            },
            TelemetryEvent::FetchFailed { reason } => format!("Telemetry failed: {}", reason),
        }
    }
}

/// Settings-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettingsEvent {
    /// Settings loaded.
    Loaded,
    /// Settings saved.
    Saved,
    /// A tuning knob changed.
    TuningChanged {
        /// Persisted key of the knob.
        key: String,
        /// New value after clamping.
        value: i64,
    },
    /// Tuning restored to defaults.
    Reset,
}

impl SettingsEvent {
    fn description(&self) -> String {
        match self {
            SettingsEvent::Loaded => "Settings loaded".to_string(),
            SettingsEvent::Saved => "Settings saved".to_string(),
            SettingsEvent::TuningChanged { key, value } => format!("Setting: {} = {}", key, value),
            SettingsEvent::Reset => "Settings reset to defaults".to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical warning that does not block operation.
    Warning,
    /// Error that may be recoverable.
    Error,
}

/// Error and diagnostic events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ErrorEvent {
    /// Warning (non-blocking).
    Warning {
        /// Short title shown to the user.
        title: String,
        /// Human-readable detail.
        message: String,
    },
    /// Error (the triggering operation was aborted).
    Error {
        /// Short title shown to the user.
        title: String,
        /// Human-readable detail.
        message: String,
    },
}

impl ErrorEvent {
    fn description(&self) -> String {
        match self {
            ErrorEvent::Warning { title, message } => format!("Warning [{}]: {}", title, message),
            ErrorEvent::Error { title, message } => format!("Error [{}]: {}", title, message),
        }
    }

    /// Get the severity of this error event
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorEvent::Warning { .. } => ErrorSeverity::Warning,
            ErrorEvent::Error { .. } => ErrorSeverity::Error,
        }
    }
}
