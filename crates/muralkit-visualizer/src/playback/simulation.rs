//! Clock-driven preview of a plan.
//!
//! [`SimulationEngine`] is the pure state machine: it turns frame timestamps
//! into distance and draws onto its own base and overlay layers.
//! [`SimulationPlayer`] wires an engine to a [`FrameScheduler`] and keeps
//! exactly one frame pending while the preview runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use muralkit_core::constants::{DEFAULT_FEED_RATE_MM_S, DEFAULT_SPEED_MULTIPLIER, MIN_PREVIEW_FPS};
use muralkit_core::CancelToken;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::scheduler::FrameScheduler;
use super::state::{advance, current_position, replay, PlaybackState};
use crate::commands::{find_segment_index_by_distance, PathModel};
use crate::visualizer::canvas_renderer::{draw_crosshair, draw_start_marker, RenderTarget};
use crate::visualizer::display_list::DisplayList;
use crate::visualizer::viewport::{Point, ViewportTransform};

/// Label drawn next to the preview crosshair
pub const PREVIEW_LABEL: &str = "Preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Idle,
    Running,
    Finished,
}

/// Speed and pacing of the preview
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Estimated device feed rate in mm/s
    pub feed_rate_mm_s: f64,
    /// Preview speed-up; values below 1 count as 1
    pub speed_multiplier: f64,
    /// Frame-rate cap; values below 5 count as 5
    pub preview_fps: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            feed_rate_mm_s: DEFAULT_FEED_RATE_MM_S,
            speed_multiplier: DEFAULT_SPEED_MULTIPLIER,
            preview_fps: 24,
        }
    }
}

impl SimulationConfig {
    /// Effective preview speed in mm/s
    pub fn mm_per_sec(&self) -> f64 {
        self.feed_rate_mm_s * self.speed_multiplier.max(1.0)
    }

    /// Minimum wall-clock time between painted frames
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.preview_fps.max(MIN_PREVIEW_FPS)))
    }
}

/// What a frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Arrived too soon after the last painted frame
    Skipped,
    Painted,
    /// The last segment was reached on this frame
    Finished,
    /// The engine is not running
    Inactive,
}

pub struct SimulationEngine {
    model: Arc<PathModel>,
    transform: ViewportTransform,
    planned: DisplayList,
    base: DisplayList,
    overlay: DisplayList,
    config: SimulationConfig,
    state: PlaybackState,
    start_dist: f64,
    status: SimulationStatus,
    last_tick: Option<Instant>,
    last_paint: Option<Instant>,
    generation: u64,
    frame_token: Option<CancelToken>,
}

impl SimulationEngine {
    /// Create an idle engine.
    ///
    /// `planned` is the static planned-path layer; the base layer is reset
    /// to a copy of it whenever playback starts.
    pub fn new(
        model: Arc<PathModel>,
        planned: DisplayList,
        transform: ViewportTransform,
        config: SimulationConfig,
    ) -> Self {
        let (w, h) = planned.size();
        let mut engine = Self {
            state: PlaybackState::at_distance(&model, 0.0),
            model,
            transform,
            base: planned.clone(),
            planned,
            overlay: DisplayList::new(w, h),
            config,
            start_dist: 0.0,
            status: SimulationStatus::Idle,
            last_tick: None,
            last_paint: None,
            generation: 0,
            frame_token: None,
        };
        engine.redraw_overlay();
        engine
    }

    /// Begin playback from `start_dist`.
    pub fn start(&mut self, start_dist: f64) {
        self.cancel_frame();
        self.generation += 1;
        self.base = self.planned.clone();
        self.start_dist = start_dist;
        self.state = PlaybackState::at_distance(&self.model, start_dist);
        self.last_tick = None;
        self.last_paint = None;
        self.status = SimulationStatus::Running;
        self.redraw_overlay();
        info!(
            "Preview started at {:.1}mm ({:.0} mm/s)",
            start_dist,
            self.config.mm_per_sec()
        );
    }

    /// Stop playback. Returns `true` if the engine was running.
    pub fn stop(&mut self) -> bool {
        self.cancel_frame();
        self.generation += 1;
        if self.status == SimulationStatus::Running {
            self.status = SimulationStatus::Idle;
            debug!("Preview stopped at {:.1}mm", self.state.dist);
            true
        } else {
            false
        }
    }

    /// Move the idle cursor and start marker to `start_dist`.
    ///
    /// Ignored while running; the new start applies to the next `start`.
    pub fn seek(&mut self, start_dist: f64) {
        self.start_dist = start_dist;
        if self.status != SimulationStatus::Running {
            self.state = PlaybackState::at_distance(&self.model, start_dist);
            self.redraw_overlay();
        }
    }

    /// Re-render onto a new planned layer and viewport.
    ///
    /// The cursor, status and pending frame are kept; progress covered so
    /// far is redrawn from the start distance.
    pub fn set_viewport(&mut self, planned: DisplayList, transform: ViewportTransform) {
        let (w, h) = planned.size();
        self.transform = transform;
        self.base = planned.clone();
        self.planned = planned;
        self.overlay = DisplayList::new(w, h);
        replay(
            &mut self.base,
            &self.model,
            &self.transform,
            self.start_dist,
            self.state.dist,
        );
        self.redraw_overlay();
        debug!("Preview re-rendered at {:.3} px/mm", transform.scale());
    }

    pub fn transform(&self) -> &ViewportTransform {
        &self.transform
    }

    /// Process one animation frame.
    pub fn on_frame(&mut self, now: Instant) -> FrameOutcome {
        if self.status != SimulationStatus::Running {
            return FrameOutcome::Inactive;
        }

        if let Some(last) = self.last_paint {
            if now.saturating_duration_since(last) < self.config.min_frame_interval() {
                return FrameOutcome::Skipped;
            }
        }
        self.last_paint = Some(now);

        let dt = self
            .last_tick
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let delta = dt * self.config.mm_per_sec();
        advance(
            &mut self.base,
            &self.model,
            &self.transform,
            delta,
            &mut self.state,
        );
        self.redraw_overlay();
        trace!("Preview frame: dt={:.4}s, dist={:.2}mm", dt, self.state.dist);

        if self.state.is_finished(&self.model) {
            self.status = SimulationStatus::Finished;
            self.frame_token = None;
            info!("Preview finished");
            FrameOutcome::Finished
        } else {
            FrameOutcome::Painted
        }
    }

    fn redraw_overlay(&mut self) {
        let pos = self
            .transform
            .mm_to_px(current_position(&self.model, &self.state));
        draw_crosshair(&mut self.overlay, pos, Some(PREVIEW_LABEL));

        let start_ix = find_segment_index_by_distance(&self.model, self.start_dist);
        if let Some(seg) = self.model.segment(start_ix) {
            draw_start_marker(&mut self.overlay, self.transform.mm_to_px(seg.start));
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(token) = self.frame_token.take() {
            token.cancel();
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SimulationStatus::Running
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn start_distance(&self) -> f64 {
        self.start_dist
    }

    /// Interpolated preview position in millimeters
    pub fn position(&self) -> Point {
        current_position(&self.model, &self.state)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Change speed or pacing; takes effect on the next frame.
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.config = config;
    }

    /// Planned path plus everything drawn so far
    pub fn base_layer(&self) -> &DisplayList {
        &self.base
    }

    /// Crosshair and start marker
    pub fn overlay_layer(&self) -> &DisplayList {
        &self.overlay
    }

    pub fn model(&self) -> &Arc<PathModel> {
        &self.model
    }
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("status", &self.status)
            .field("state", &self.state)
            .field("start_dist", &self.start_dist)
            .finish()
    }
}

type CompletionHandler = Arc<dyn Fn() + Send + Sync>;

/// Runs a [`SimulationEngine`] off a [`FrameScheduler`].
pub struct SimulationPlayer {
    engine: Arc<Mutex<SimulationEngine>>,
    scheduler: Arc<dyn FrameScheduler>,
    on_finished: Option<CompletionHandler>,
}

impl SimulationPlayer {
    pub fn new(engine: SimulationEngine, scheduler: Arc<dyn FrameScheduler>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            scheduler,
            on_finished: None,
        }
    }

    /// Call `handler` when the preview reaches the end of the plan.
    pub fn with_completion<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_finished = Some(Arc::new(handler));
        self
    }

    /// Start (or restart) the preview from `start_dist`.
    pub fn start(&self, start_dist: f64) {
        let mut engine = self.engine.lock();
        engine.start(start_dist);
        let generation = engine.generation;
        let token = schedule_frame(
            Arc::clone(&self.engine),
            Arc::clone(&self.scheduler),
            self.on_finished.clone(),
            generation,
        );
        engine.frame_token = Some(token);
    }

    /// Stop the preview. Idempotent.
    pub fn stop(&self) -> bool {
        self.engine.lock().stop()
    }

    pub fn seek(&self, start_dist: f64) {
        self.engine.lock().seek(start_dist);
    }

    pub fn is_running(&self) -> bool {
        self.engine.lock().is_running()
    }

    pub fn status(&self) -> SimulationStatus {
        self.engine.lock().status()
    }

    /// Shared handle to the engine, for reading layers and state
    pub fn engine(&self) -> &Arc<Mutex<SimulationEngine>> {
        &self.engine
    }
}

impl Drop for SimulationPlayer {
    fn drop(&mut self) {
        self.engine.lock().stop();
    }
}

impl std::fmt::Debug for SimulationPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationPlayer")
            .field("engine", &*self.engine.lock())
            .finish()
    }
}

fn schedule_frame(
    engine: Arc<Mutex<SimulationEngine>>,
    scheduler: Arc<dyn FrameScheduler>,
    on_finished: Option<CompletionHandler>,
    generation: u64,
) -> CancelToken {
    let next_scheduler = Arc::clone(&scheduler);
    scheduler.schedule(Box::new(move |now| {
        let mut guard = engine.lock();
        // A frame from before the last start/stop must not revive the loop
        if guard.generation != generation {
            return;
        }

        match guard.on_frame(now) {
            FrameOutcome::Painted | FrameOutcome::Skipped => {
                let token = schedule_frame(
                    Arc::clone(&engine),
                    next_scheduler,
                    on_finished,
                    generation,
                );
                guard.frame_token = Some(token);
            }
            FrameOutcome::Finished => {
                drop(guard);
                if let Some(handler) = on_finished {
                    handler();
                }
            }
            FrameOutcome::Inactive => {}
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_commands_sync;
    use crate::playback::scheduler::ManualScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(config: SimulationConfig) -> SimulationEngine {
        let model = Arc::new(
            parse_commands_sync("d0\nh0\np1\n100 0\n100 100\n", Point::default()).unwrap(),
        );
        let transform = ViewportTransform::fit_default(model.bounds(), 200.0, 200.0);
        SimulationEngine::new(model, DisplayList::new(200.0, 200.0), transform, config)
    }

    fn config(feed: f64, mult: f64, fps: u32) -> SimulationConfig {
        SimulationConfig {
            feed_rate_mm_s: feed,
            speed_multiplier: mult,
            preview_fps: fps,
        }
    }

    #[test]
    fn test_config_math() {
        let cfg = config(60.0, 0.5, 1);
        assert_eq!(cfg.mm_per_sec(), 60.0);
        assert!((cfg.min_frame_interval().as_secs_f64() - 0.2).abs() < 1e-9);
        assert_eq!(SimulationConfig::default().mm_per_sec(), 900.0);
    }

    #[test]
    fn test_first_frame_has_zero_delta() {
        let mut e = engine(config(10.0, 1.0, 60));
        e.start(0.0);
        let t0 = Instant::now();

        assert_eq!(e.on_frame(t0), FrameOutcome::Painted);
        assert_eq!(e.state().dist, 0.0);

        assert_eq!(e.on_frame(t0 + Duration::from_secs(1)), FrameOutcome::Painted);
        assert!((e.state().dist - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_frames_coalesced_under_cap() {
        let mut e = engine(config(10.0, 1.0, 10));
        e.start(0.0);
        let t0 = Instant::now();

        assert_eq!(e.on_frame(t0), FrameOutcome::Painted);
        assert_eq!(
            e.on_frame(t0 + Duration::from_millis(50)),
            FrameOutcome::Skipped
        );
        // Skipped time is not lost
        assert_eq!(
            e.on_frame(t0 + Duration::from_millis(500)),
            FrameOutcome::Painted
        );
        assert!((e.state().dist - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_runs_to_finish() {
        let mut e = engine(config(100.0, 1.0, 60));
        e.start(0.0);
        let t0 = Instant::now();
        e.on_frame(t0);
        assert_eq!(e.on_frame(t0 + Duration::from_secs(5)), FrameOutcome::Finished);
        assert_eq!(e.status(), SimulationStatus::Finished);
        assert_eq!(e.on_frame(t0 + Duration::from_secs(6)), FrameOutcome::Inactive);
    }

    #[test]
    fn test_start_resets_base_and_cursor() {
        let mut e = engine(config(100.0, 1.0, 60));
        e.start(0.0);
        let t0 = Instant::now();
        e.on_frame(t0);
        e.on_frame(t0 + Duration::from_millis(500));
        assert!(e.base_layer().line_count() > 0);

        e.start(100.0);
        assert_eq!(e.base_layer().line_count(), 0);
        assert_eq!(e.state().segment_index, 1);
        assert_eq!(e.state().dist, 100.0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut e = engine(SimulationConfig::default());
        assert!(!e.stop());
        e.start(0.0);
        assert!(e.stop());
        assert!(!e.stop());
        assert_eq!(e.status(), SimulationStatus::Idle);
    }

    #[test]
    fn test_seek_moves_idle_cursor() {
        let mut e = engine(SimulationConfig::default());
        e.seek(150.0);
        assert_eq!(e.state().segment_index, 1);
        assert_eq!(e.position(), Point::new(100.0, 0.0));
        assert_eq!(e.start_distance(), 150.0);
    }

    #[test]
    fn test_viewport_change_keeps_running_cursor() {
        let mut e = engine(config(100.0, 1.0, 60));
        let t0 = Instant::now();
        e.start(0.0);
        e.on_frame(t0);
        e.on_frame(t0 + Duration::from_millis(500));
        let dist = e.state().dist;
        let lines = e.base_layer().line_count();

        let transform = ViewportTransform::fit_default(e.model().bounds(), 400.0, 400.0);
        e.set_viewport(DisplayList::new(400.0, 400.0), transform);

        assert!(e.is_running());
        assert_eq!(e.state().dist, dist);
        assert_eq!(e.base_layer().line_count(), lines);
        assert_eq!(e.base_layer().size(), (400.0, 400.0));
        assert!(e.transform().scale() > 3.0);
    }

    #[test]
    fn test_player_drives_frames() {
        let scheduler = Arc::new(ManualScheduler::new());
        let finished = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&finished);
        let player = SimulationPlayer::new(engine(config(100.0, 1.0, 60)), scheduler.clone())
            .with_completion(move || {
                f.fetch_add(1, Ordering::SeqCst);
            });

        player.start(0.0);
        assert_eq!(scheduler.pending(), 1);

        let t0 = Instant::now();
        let mut frame = 0u64;
        while scheduler.fire(t0 + Duration::from_millis(100 * frame)) {
            frame += 1;
            assert!(frame < 1000, "preview never finished");
        }

        assert_eq!(player.status(), SimulationStatus::Finished);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_player_stop_cancels_pending_frame() {
        let scheduler = Arc::new(ManualScheduler::new());
        let player = SimulationPlayer::new(engine(SimulationConfig::default()), scheduler.clone());

        player.start(0.0);
        assert!(player.stop());
        assert!(!scheduler.fire(Instant::now()));
        assert!(!player.is_running());
    }

    #[test]
    fn test_player_restart_keeps_single_loop() {
        let scheduler = Arc::new(ManualScheduler::new());
        let player = SimulationPlayer::new(engine(SimulationConfig::default()), scheduler.clone());

        player.start(0.0);
        player.start(0.0);
        let now = Instant::now();
        assert!(scheduler.fire(now));
        // The first start's frame was cancelled; exactly one frame is queued again
        assert_eq!(scheduler.pending(), 1);
    }
}
