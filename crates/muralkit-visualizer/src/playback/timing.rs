//! Elapsed time, average speed and ETA for a running job.
//!
//! The timer listens to the same [`AppEvent`]s the rest of the application
//! publishes. Wall-clock time only accumulates between telemetry samples
//! that report the device running and not paused.

use std::time::{Duration, Instant};

use muralkit_core::constants::MIN_ETA_SPEED_MM_S;
use muralkit_core::{AppEvent, JobEvent, TelemetryEvent, TelemetrySample};
use serde::Serialize;

/// Snapshot of the stats card
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobStats {
    /// Distance of this run (total minus the resume point), in millimeters
    pub range_mm: f64,
    pub done_mm: f64,
    pub left_mm: f64,
    /// Clamped progress in percent
    pub progress: f64,
    /// Running time; `None` before the clock started
    pub elapsed: Option<Duration>,
    /// Average speed in mm/s; `None` before the clock started
    pub avg_speed_mm_s: Option<f64>,
    /// Remaining time at the average speed
    pub eta: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct JobTimer {
    total_mm: Option<f64>,
    start_mm: f64,
    started: bool,
    accumulated: Duration,
    last_run_tick: Option<Instant>,
    last_progress: Option<f64>,
}

impl JobTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an application event observed at `now`.
    ///
    /// Returns fresh stats for telemetry samples and job starts.
    pub fn handle_event(&mut self, event: &AppEvent, now: Instant) -> Option<JobStats> {
        match event {
            AppEvent::Job(JobEvent::ModelLoaded {
                total_distance_mm, ..
            }) => {
                self.set_total(*total_distance_mm);
                None
            }
            AppEvent::Job(JobEvent::Started {
                start_dist_mm,
                total_distance_mm,
                ..
            }) => {
                if let Some(total) = total_distance_mm {
                    self.set_total(*total);
                }
                self.job_started(*start_dist_mm, now);
                Some(self.stats())
            }
            AppEvent::Job(JobEvent::Stopped) | AppEvent::Job(JobEvent::Finished { .. }) => {
                self.job_stopped();
                None
            }
            AppEvent::Telemetry(TelemetryEvent::Sample(sample)) => Some(self.on_sample(sample, now)),
            _ => None,
        }
    }

    /// Set the plan length; non-positive or non-finite values are ignored.
    pub fn set_total(&mut self, total_mm: f64) {
        if total_mm.is_finite() && total_mm > 0.0 {
            self.total_mm = Some(total_mm);
        }
    }

    /// Reset the clock for a job resuming at `start_mm`.
    pub fn job_started(&mut self, start_mm: f64, now: Instant) {
        self.started = true;
        self.accumulated = Duration::ZERO;
        self.last_run_tick = Some(now);
        self.start_mm = if start_mm.is_finite() { start_mm } else { 0.0 };
    }

    /// Freeze the clock.
    pub fn job_stopped(&mut self) {
        self.last_run_tick = None;
    }

    pub fn on_sample(&mut self, sample: &TelemetrySample, now: Instant) -> JobStats {
        self.last_progress = sample.progress;
        let running = sample.is_drawing();

        if self.started && running {
            let last = self.last_run_tick.unwrap_or(now);
            self.accumulated += now.saturating_duration_since(last);
            self.last_run_tick = Some(now);
        } else {
            self.last_run_tick = None;
        }

        // Joined a job that was already running
        if running && !self.started {
            self.started = true;
            self.accumulated = Duration::ZERO;
            self.last_run_tick = Some(now);
        }

        self.stats()
    }

    /// Current stats; distances are zero until the plan length is known.
    pub fn stats(&self) -> JobStats {
        let progress = self
            .last_progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0))
            .unwrap_or(0.0);

        let range = self
            .total_mm
            .map(|total| (total - self.start_mm).max(0.0))
            .unwrap_or(0.0);
        let done = progress / 100.0 * range;
        let left = (range - done).max(0.0);

        let (elapsed, avg_speed, eta) = if self.started && self.total_mm.is_some() {
            let elapsed_secs = self.accumulated.as_secs_f64().max(1.0);
            let avg = done / elapsed_secs;
            let eta = (avg > MIN_ETA_SPEED_MM_S)
                .then(|| Duration::try_from_secs_f64(left / avg).ok())
                .flatten();
            (Some(Duration::from_secs_f64(elapsed_secs)), Some(avg), eta)
        } else {
            (None, None, None)
        };

        JobStats {
            range_mm: range,
            done_mm: done,
            left_mm: left,
            progress,
            elapsed,
            avg_speed_mm_s: avg_speed,
            eta,
        }
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// `m:ss`, or `h:mm:ss` from one hour on. Fractions are truncated.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Millimeters as meters: two decimals below 10 m, one below 100 m.
pub fn format_distance(mm: f64) -> String {
    let m = if mm.is_finite() { mm / 1000.0 } else { 0.0 };
    if m < 10.0 {
        format!("{:.2} m", m)
    } else if m < 100.0 {
        format!("{:.1} m", m)
    } else {
        format!("{:.0} m", m)
    }
}

/// Speed in mm/s, or a dash when effectively stopped.
pub fn format_speed(mm_per_sec: f64) -> String {
    let v = if mm_per_sec.is_finite() {
        mm_per_sec
    } else {
        0.0
    };
    if v <= MIN_ETA_SPEED_MM_S {
        "—".to_string()
    } else if v < 10.0 {
        format!("{:.2} mm/s", v)
    } else if v < 100.0 {
        format!("{:.1} mm/s", v)
    } else {
        format!("{:.0} mm/s", v)
    }
}
