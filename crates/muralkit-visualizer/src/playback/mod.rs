//! Playback engines over a parsed plan.
//!
//! Both engines own their cursor and layers; they only share the read-only
//! [`PathModel`](crate::commands::PathModel).

pub mod live;
pub mod scheduler;
pub mod simulation;
pub mod state;
pub mod timing;

pub use live::{LiveSyncEngine, LiveUpdate};
pub use scheduler::{FrameCallback, FrameScheduler, ManualScheduler, TokioFrameScheduler};
pub use simulation::{
    FrameOutcome, SimulationConfig, SimulationEngine, SimulationPlayer, SimulationStatus,
    PREVIEW_LABEL,
};
pub use state::{advance, current_position, replay, PlaybackState};
pub use timing::{format_distance, format_duration, format_speed, JobStats, JobTimer};
