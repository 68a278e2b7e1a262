//! Shared constants for MuralKit.

/// Canvas padding around the fitted plan, in pixels
pub const CANVAS_PADDING_PX: f64 = 16.0;

/// Minimum bounding box extent used when fitting a plan, in millimeters
pub const MIN_FIT_EXTENT_MM: f64 = 1.0;

/// Segments at or below this length are treated as zero-length, in millimeters
pub const MIN_SEGMENT_LEN_MM: f64 = 0.000_001;

/// Fractional progress at which a segment counts as fully traversed
pub const SEGMENT_COMPLETE_FRACTION: f64 = 0.999_999;

/// Fallback feed rate when device diagnostics are unusable, in mm/s
pub const DEFAULT_FEED_RATE_MM_S: f64 = 60.0;

/// Lower clamp for the estimated feed rate, in mm/s
pub const MIN_FEED_RATE_MM_S: f64 = 10.0;

/// Upper clamp for the estimated feed rate, in mm/s
pub const MAX_FEED_RATE_MM_S: f64 = 400.0;

/// Default preview speed multiplier
pub const DEFAULT_SPEED_MULTIPLIER: f64 = 15.0;

/// Frame-rate floor for the preview loop
pub const MIN_PREVIEW_FPS: u32 = 5;

/// Timeout for downloading the command stream from the device, in milliseconds
pub const COMMANDS_DOWNLOAD_TIMEOUT_MS: u64 = 6000;

/// Progress (percent) at or above which a running → idle edge counts as a finished job
pub const JOB_FINISHED_PROGRESS: f64 = 99.0;

/// Average speeds at or below this value produce no ETA, in mm/s
pub const MIN_ETA_SPEED_MM_S: f64 = 0.0001;
