//! Device telemetry sample
//!
//! The decoded, sanitized form of one `/status` poll. Every numeric field is
//! optional: missing or non-finite values arrive as `None` and each consumer
//! decides its own substitution.

use serde::{Deserialize, Serialize};

/// One telemetry sample from the plotter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Job progress in percent (0–100), relative to the resume point
    pub progress: Option<f64>,
    /// Pen X position in millimeters
    pub x: Option<f64>,
    /// Pen Y position in millimeters
    pub y: Option<f64>,
    /// Device reports a paused job
    pub paused: bool,
    /// Device reports a running job
    pub running: bool,
}

impl TelemetrySample {
    /// Build a sample, discarding non-finite numbers
    pub fn new(progress: Option<f64>, x: Option<f64>, y: Option<f64>) -> Self {
        Self {
            progress: progress.filter(|v| v.is_finite()),
            x: x.filter(|v| v.is_finite()),
            y: y.filter(|v| v.is_finite()),
            paused: false,
            running: false,
        }
    }

    /// Set the running flag
    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    /// Set the paused flag
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Progress clamped to [0, 100], or `None` when absent or not a number
    pub fn progress_percent(&self) -> Option<f64> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0))
    }

    /// Device position when both coordinates are present
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        }
    }

    /// Whether the pen is actually moving: running and not paused
    pub fn is_drawing(&self) -> bool {
        self.running && !self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_values_dropped() {
        let sample = TelemetrySample::new(Some(f64::NAN), Some(1.0), Some(f64::INFINITY));
        assert_eq!(sample.progress_percent(), None);
        assert_eq!(sample.position(), None);
        assert_eq!(sample.x, Some(1.0));
    }

    #[test]
    fn test_progress_clamped() {
        let sample = TelemetrySample::new(Some(140.0), None, None);
        assert_eq!(sample.progress_percent(), Some(100.0));

        let sample = TelemetrySample::new(Some(-3.0), None, None);
        assert_eq!(sample.progress_percent(), Some(0.0));
    }

    #[test]
    fn test_is_drawing() {
        let sample = TelemetrySample::default().with_running(true);
        assert!(sample.is_drawing());
        assert!(!sample.with_paused(true).is_drawing());
        assert!(!TelemetrySample::default().is_drawing());
    }
}
