//! Telemetry-driven live view.
//!
//! Maps the device's progress percentage onto plan distance and draws the
//! newly covered part with the same [`advance`] the preview uses.

use std::sync::Arc;

use muralkit_core::TelemetrySample;
use serde::Serialize;
use tracing::{debug, trace};

use super::state::{advance, current_position, replay, PlaybackState};
use crate::commands::{find_segment_index_by_distance, PathModel};
use crate::visualizer::canvas_renderer::{
    draw_crosshair, draw_paused_banner, draw_start_marker, RenderTarget,
};
use crate::visualizer::display_list::DisplayList;
use crate::visualizer::viewport::{Point, ViewportTransform};

/// Result of applying one telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveUpdate {
    /// Whether the drawn progress moved forward
    pub advanced: bool,
    /// Plan distance the sample maps to; `None` without a usable progress
    pub target_dist: Option<f64>,
    /// Live cursor distance after the sample
    pub dist: f64,
    /// Crosshair position in plan millimeters
    pub position: Point,
}

pub struct LiveSyncEngine {
    model: Arc<PathModel>,
    transform: ViewportTransform,
    planned: DisplayList,
    base: DisplayList,
    overlay: DisplayList,
    resume_dist: f64,
    live_start_dist: f64,
    state: Option<PlaybackState>,
    last_device_pos: Option<Point>,
    last_progress: Option<f64>,
    last_paused: bool,
}

impl LiveSyncEngine {
    pub fn new(model: Arc<PathModel>, planned: DisplayList, transform: ViewportTransform) -> Self {
        let (w, h) = planned.size();
        Self {
            model,
            transform,
            base: planned.clone(),
            planned,
            overlay: DisplayList::new(w, h),
            resume_dist: 0.0,
            live_start_dist: 0.0,
            state: None,
            last_device_pos: None,
            last_progress: None,
            last_paused: false,
        }
    }

    /// Select where the next job resumes; applied on its first telemetry.
    pub fn set_resume_distance(&mut self, dist: f64) {
        self.resume_dist = dist;
    }

    /// A job started from `resume_dist`.
    ///
    /// The cursor is established lazily by the first telemetry sample so a
    /// view attached mid-job still lines up with the device.
    pub fn job_started(&mut self, resume_dist: f64) {
        self.resume_dist = resume_dist;
        self.state = None;
        self.last_progress = None;
        self.overlay.clear();
        debug!("Live view armed at {:.1}mm", resume_dist);
    }

    fn establish(&mut self) -> PlaybackState {
        self.base = self.planned.clone();
        self.overlay.clear();
        self.live_start_dist = self.resume_dist;
        debug!("Live cursor established at {:.1}mm", self.live_start_dist);
        PlaybackState::at_distance(&self.model, self.live_start_dist)
    }

    /// Plan distance for a progress percentage relative to the live start.
    pub fn target_for_progress(&self, progress: f64) -> f64 {
        let range = (self.model.total_distance() - self.live_start_dist).max(0.0);
        self.live_start_dist + progress.clamp(0.0, 100.0) / 100.0 * range
    }

    /// Apply one telemetry sample.
    ///
    /// Progress only ever moves the cursor forward; a stale or lower value
    /// leaves it in place. Missing coordinates fall back to the last known
    /// device position, then to the cursor's plan position.
    pub fn on_telemetry(&mut self, sample: &TelemetrySample) -> LiveUpdate {
        let mut state = match self.state.take() {
            Some(state) => state,
            None => self.establish(),
        };

        let progress = sample.progress_percent();
        let target_dist = progress.map(|p| self.target_for_progress(p));

        let mut advanced = false;
        if let Some(target) = target_dist {
            if target > state.dist {
                advance(
                    &mut self.base,
                    &self.model,
                    &self.transform,
                    target - state.dist,
                    &mut state,
                );
                advanced = true;
            } else {
                trace!(
                    "Live sample at {:.2}mm not past {:.2}mm",
                    target,
                    state.dist
                );
            }
        }
        let dist = state.dist;
        let plan_pos = current_position(&self.model, &state);
        self.state = Some(state);

        if progress.is_some() {
            self.last_progress = progress;
        }
        if let Some((x, y)) = sample.position() {
            self.last_device_pos = Some(Point::new(x, y));
        }
        let position = self.last_device_pos.unwrap_or(plan_pos);

        self.last_paused = sample.paused;
        self.redraw_overlay(position, sample.paused);

        LiveUpdate {
            advanced,
            target_dist,
            dist,
            position,
        }
    }

    fn redraw_overlay(&mut self, position: Point, paused: bool) {
        let label = format!("{}%", self.last_progress.unwrap_or(0.0).round());
        draw_crosshair(
            &mut self.overlay,
            self.transform.mm_to_px(position),
            Some(&label),
        );

        let start_ix = find_segment_index_by_distance(&self.model, self.live_start_dist);
        if let Some(seg) = self.model.segment(start_ix) {
            draw_start_marker(&mut self.overlay, self.transform.mm_to_px(seg.start));
        }

        if paused {
            draw_paused_banner(&mut self.overlay);
        }
    }

    /// Re-render onto a new planned layer and viewport.
    ///
    /// Covered progress is redrawn from the live start distance and the
    /// crosshair is placed at the last known position.
    pub fn set_viewport(&mut self, planned: DisplayList, transform: ViewportTransform) {
        let (w, h) = planned.size();
        self.transform = transform;
        self.base = planned.clone();
        self.planned = planned;
        self.overlay = DisplayList::new(w, h);

        if let Some(state) = self.state {
            replay(
                &mut self.base,
                &self.model,
                &self.transform,
                self.live_start_dist,
                state.dist,
            );
            let position = self
                .last_device_pos
                .unwrap_or_else(|| current_position(&self.model, &state));
            self.redraw_overlay(position, self.last_paused);
        }
    }

    pub fn transform(&self) -> &ViewportTransform {
        &self.transform
    }

    /// Forget the job; the next sample starts from the resume distance again.
    pub fn reset(&mut self) {
        self.state = None;
        self.last_progress = None;
        self.last_device_pos = None;
        self.last_paused = false;
        self.base = self.planned.clone();
        self.overlay.clear();
    }

    pub fn state(&self) -> Option<&PlaybackState> {
        self.state.as_ref()
    }

    /// Distance the current job started from
    pub fn live_start_distance(&self) -> f64 {
        self.live_start_dist
    }

    pub fn base_layer(&self) -> &DisplayList {
        &self.base
    }

    pub fn overlay_layer(&self) -> &DisplayList {
        &self.overlay
    }

    pub fn model(&self) -> &Arc<PathModel> {
        &self.model
    }
}

impl std::fmt::Debug for LiveSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSyncEngine")
            .field("live_start_dist", &self.live_start_dist)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_commands_sync;
    use crate::visualizer::display_list::DrawOp;

    fn engine() -> LiveSyncEngine {
        let model = Arc::new(
            parse_commands_sync("d100\nh0\np1\n50 0\n100 0\n", Point::default()).unwrap(),
        );
        let transform = ViewportTransform::fit_default(model.bounds(), 200.0, 100.0);
        LiveSyncEngine::new(model, DisplayList::new(200.0, 100.0), transform)
    }

    fn sample(progress: f64) -> TelemetrySample {
        TelemetrySample::new(Some(progress), None, None).with_running(true)
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut live = engine();
        live.job_started(0.0);

        let a = live.on_telemetry(&sample(10.0));
        let b = live.on_telemetry(&sample(5.0));
        let c = live.on_telemetry(&sample(20.0));

        assert!(a.advanced);
        assert!(!b.advanced);
        assert!(c.advanced);
        assert_eq!(b.dist, 10.0);
        assert_eq!(c.dist, 20.0);
    }

    #[test]
    fn test_progress_relative_to_resume_point() {
        let mut live = engine();
        live.job_started(50.0);

        let update = live.on_telemetry(&sample(50.0));
        assert_eq!(update.target_dist, Some(75.0));
        assert_eq!(update.dist, 75.0);
        assert_eq!(live.live_start_distance(), 50.0);
        // Nothing before the resume point was drawn
        assert_eq!(live.base_layer().line_count(), 1);
    }

    #[test]
    fn test_missing_progress_does_not_advance() {
        let mut live = engine();
        live.job_started(0.0);

        let update = live.on_telemetry(&TelemetrySample::new(None, Some(3.0), Some(4.0)));
        assert!(!update.advanced);
        assert_eq!(update.target_dist, None);
        assert_eq!(update.position, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_position_fallbacks() {
        let mut live = engine();
        live.job_started(0.0);

        let first = live.on_telemetry(&sample(25.0));
        assert_eq!(first.position, Point::new(25.0, 0.0));

        live.on_telemetry(&TelemetrySample::new(Some(30.0), Some(7.0), Some(1.0)));
        let after = live.on_telemetry(&sample(40.0));
        assert_eq!(after.position, Point::new(7.0, 1.0));
    }

    #[test]
    fn test_overlay_label_and_pause() {
        let mut live = engine();
        live.job_started(0.0);
        live.on_telemetry(&sample(42.4).with_paused(true));

        let texts: Vec<String> = live
            .overlay_layer()
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["42%".to_string(), "PAUSE".to_string()]);
    }

    #[test]
    fn test_viewport_change_redraws_progress() {
        let mut live = engine();
        live.job_started(0.0);
        live.on_telemetry(&sample(40.0));
        let before = live.base_layer().line_count();

        let transform = ViewportTransform::fit_default(live.model().bounds(), 400.0, 200.0);
        live.set_viewport(DisplayList::new(400.0, 200.0), transform);

        assert_eq!(live.base_layer().size(), (400.0, 200.0));
        assert_eq!(live.base_layer().line_count(), before);
        assert_eq!(live.state().map(|s| s.dist), Some(40.0));
        // Crosshair and start marker are back on the overlay
        assert!(!live.overlay_layer().is_empty());

        let update = live.on_telemetry(&sample(50.0));
        assert!(update.advanced);
        assert_eq!(update.dist, 50.0);
    }

    #[test]
    fn test_job_restart_resets_cursor() {
        let mut live = engine();
        live.job_started(0.0);
        live.on_telemetry(&sample(80.0));

        live.job_started(0.0);
        let update = live.on_telemetry(&sample(10.0));
        assert!(update.advanced);
        assert_eq!(update.dist, 10.0);
    }
}
