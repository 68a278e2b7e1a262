//! # MuralKit Visualizer
//!
//! Turns a plotter command stream into an arc-length indexed plan, renders
//! it, and drives the preview and live playback cursors over it.

pub mod commands;
pub mod playback;
pub mod visualizer;

pub use commands::{
    find_segment_index_by_distance, find_start_by_percent, parse_commands, parse_commands_sync,
    PathModel, ResumePoint, Segment,
};

pub use playback::{
    advance, current_position, format_distance, format_duration, format_speed, FrameScheduler,
    JobStats, JobTimer, LiveSyncEngine, LiveUpdate, ManualScheduler, PlaybackState,
    replay, SimulationConfig, SimulationEngine, SimulationPlayer, SimulationStatus, TokioFrameScheduler,
};

pub use visualizer::{
    draw_background, draw_planned_path, draw_planned_path_sync, svg_document, Bounds,
    DisplayList, Point, RenderTarget, ViewportTransform,
};
