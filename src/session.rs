//! Job session
//!
//! Owns the loaded plan and everything derived from it: the preview player,
//! the live sync engine, the resume point, the job timer and the telemetry
//! poller. Every state change is announced on the shared [`EventBus`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use muralkit_communication::{DeviceApi, PollEvent, PollerHandle, TelemetryPoller};
use muralkit_core::constants::{COMMANDS_DOWNLOAD_TIMEOUT_MS, JOB_FINISHED_PROGRESS};
use muralkit_core::{
    AppEvent, CancelToken, ErrorEvent, EventBus, JobEvent, ParseError, SettingsEvent,
    TelemetryEvent, TelemetrySample,
};
use muralkit_settings::{UiTuning, ALL_LIMITS};
use muralkit_visualizer::{
    draw_background, draw_planned_path, find_start_by_percent, parse_commands, svg_document,
    DisplayList, FrameScheduler, JobStats, JobTimer, LiveSyncEngine, LiveUpdate, PathModel,
    Point, ResumePoint, SimulationConfig, SimulationEngine, SimulationPlayer, SimulationStatus,
    ViewportTransform,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const POLL_EVENT_CAPACITY: usize = 32;

/// What one telemetry sample changed
#[derive(Debug, Clone, Copy)]
pub struct TelemetryUpdate {
    /// Live view update; `None` without a loaded plan
    pub live: Option<LiveUpdate>,
    pub stats: JobStats,
    /// Final progress when this sample completed the job
    pub finished: Option<f64>,
}

/// Detects the end of a job from the `running` flag.
///
/// A job is finished when `running` drops while progress is at least 99%
/// and the device is not paused. It fires once, then stays quiet until the
/// device is seen running again.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishDetector {
    last_running: bool,
    latched: bool,
}

impl FinishDetector {
    pub fn observe(&mut self, sample: &TelemetrySample) -> Option<f64> {
        let mut finished = None;
        if sample.running {
            self.latched = false;
        } else if self.last_running && !self.latched && !sample.paused {
            let progress = sample.progress_percent().unwrap_or(0.0);
            if progress >= JOB_FINISHED_PROGRESS {
                self.latched = true;
                finished = Some(progress);
            }
        }
        self.last_running = sample.running;
        finished
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

struct LoadedJob {
    model: Arc<PathModel>,
    preview: SimulationPlayer,
    live: LiveSyncEngine,
}

struct SessionState {
    canvas: (f64, f64),
    home: Point,
    tuning: UiTuning,
    sim_config: SimulationConfig,
    parse_token: Option<CancelToken>,
    resize_token: Option<CancelToken>,
    job: Option<LoadedJob>,
    resume: ResumePoint,
    timer: JobTimer,
    finish: FinishDetector,
}

struct Polling {
    api: Arc<dyn DeviceApi>,
    events: mpsc::Sender<PollEvent>,
    handle: PollerHandle,
    forward: JoinHandle<()>,
}

impl Polling {
    /// Spawn a poller whose events are forwarded into `events`
    fn spawn(api: Arc<dyn DeviceApi>, events: mpsc::Sender<PollEvent>, interval_ms: u64) -> Self {
        let (handle, mut rx) = TelemetryPoller::new(Arc::clone(&api), interval_ms).spawn();
        let tx = events.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Self {
            api,
            events,
            handle,
            forward,
        }
    }
}

impl Drop for Polling {
    fn drop(&mut self) {
        self.handle.stop();
        self.forward.abort();
    }
}

/// Fit `model` to `canvas` and draw its background and planned path.
///
/// `None` when `token` was cancelled before the drawing completed.
async fn render_planned(
    model: &PathModel,
    (w, h): (f64, f64),
    segments_per_tick: usize,
    token: &CancelToken,
) -> Option<(DisplayList, ViewportTransform)> {
    let transform = ViewportTransform::fit_default(model.bounds(), w, h);
    let mut planned = DisplayList::new(w, h);
    draw_background(&mut planned);
    let drawn = draw_planned_path(&mut planned, model, &transform, segments_per_tick, token).await;
    (drawn && !token.is_cancelled()).then_some((planned, transform))
}

pub struct JobSession {
    bus: Arc<EventBus>,
    scheduler: Arc<dyn FrameScheduler>,
    state: Mutex<SessionState>,
    polling: Mutex<Option<Polling>>,
}

impl JobSession {
    /// Create a session rendering onto a `width` x `height` px canvas.
    pub fn new(
        bus: Arc<EventBus>,
        scheduler: Arc<dyn FrameScheduler>,
        tuning: UiTuning,
        width: f64,
        height: f64,
    ) -> Self {
        let sim_config = SimulationConfig {
            preview_fps: tuning.preview_fps,
            ..SimulationConfig::default()
        };
        Self {
            bus,
            scheduler,
            state: Mutex::new(SessionState {
                canvas: (width, height),
                home: Point::default(),
                tuning,
                sim_config,
                parse_token: None,
                resize_token: None,
                job: None,
                resume: ResumePoint::default(),
                timer: JobTimer::new(),
                finish: FinishDetector::default(),
            }),
            polling: Mutex::new(None),
        }
    }

    /// Pen position the device starts each job from; applies to the next load
    pub fn set_home(&self, home: Point) {
        self.state.lock().home = home;
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Parse `text` and install it as the current plan.
    ///
    /// Starting another load cancels this one. On error the previously
    /// loaded plan stays in place.
    pub async fn load_commands(&self, text: &str) -> Result<Arc<PathModel>, ParseError> {
        let token = CancelToken::new();
        let (home, tuning, canvas) = {
            let mut state = self.state.lock();
            if let Some(previous) = state.parse_token.replace(token.clone()) {
                debug!("Cancelling previous load");
                previous.cancel();
            }
            (state.home, state.tuning, state.canvas)
        };

        let model = parse_commands(text, home, tuning.parse_lines_per_tick, &token).await?;
        let lines_read = model.line_count();
        let cancelled = move || ParseError::Cancelled { lines_read };

        let (planned, transform) =
            render_planned(&model, canvas, tuning.draw_segments_per_tick, &token)
                .await
                .ok_or_else(cancelled)?;

        let model = Arc::new(model);
        let event = AppEvent::Job(JobEvent::ModelLoaded {
            total_distance_mm: model.total_distance(),
            header_total_mm: model.header_total(),
            line_count: model.line_count(),
            segment_count: model.segment_count(),
        });

        let resized = {
            let mut state = self.state.lock();
            // A newer load may have started while the lock was released
            if token.is_cancelled() {
                return Err(cancelled());
            }
            if state
                .parse_token
                .as_ref()
                .is_some_and(|current| current.same_as(&token))
            {
                state.parse_token = None;
            }

            if let Some(old) = state.job.take() {
                old.preview.stop();
            }
            let engine = SimulationEngine::new(
                Arc::clone(&model),
                planned.clone(),
                transform,
                state.sim_config,
            );
            let preview = SimulationPlayer::new(engine, Arc::clone(&self.scheduler))
                .with_completion(|| info!("Preview reached the end of the plan"));
            let mut live = LiveSyncEngine::new(Arc::clone(&model), planned, transform);

            let resume = find_start_by_percent(&model, 0.0);
            preview.seek(resume.start_dist);
            live.set_resume_distance(resume.start_dist);

            state.job = Some(LoadedJob {
                model: Arc::clone(&model),
                preview,
                live,
            });
            state.resume = resume;
            state.timer.handle_event(&event, Instant::now());
            (state.canvas != canvas).then_some(state.canvas)
        };

        info!("{}", model.summary());
        self.bus.publish(event);

        // The canvas changed while this plan was being drawn
        if let Some((w, h)) = resized {
            self.resize(w, h).await;
        }
        Ok(model)
    }

    /// Refit the plan to a `width` x `height` px canvas.
    ///
    /// The planned layer is redrawn and both views are re-rendered at their
    /// current cursors; a running preview keeps running. Returns whether a
    /// loaded plan was re-rendered.
    pub async fn resize(&self, width: f64, height: f64) -> bool {
        let token = CancelToken::new();
        let (model, tuning) = {
            let mut state = self.state.lock();
            state.canvas = (width, height);
            if let Some(previous) = state.resize_token.replace(token.clone()) {
                previous.cancel();
            }
            match state.job.as_ref() {
                Some(job) => (Arc::clone(&job.model), state.tuning),
                None => return false,
            }
        };

        let Some((planned, transform)) = render_planned(
            &model,
            (width, height),
            tuning.draw_segments_per_tick,
            &token,
        )
        .await
        else {
            return false;
        };

        let mut state = self.state.lock();
        if token.is_cancelled() || state.canvas != (width, height) {
            return false;
        }
        if state
            .resize_token
            .as_ref()
            .is_some_and(|current| current.same_as(&token))
        {
            state.resize_token = None;
        }
        // A different plan was loaded meanwhile; it was drawn for this canvas
        let Some(job) = state
            .job
            .as_mut()
            .filter(|job| Arc::ptr_eq(&job.model, &model))
        else {
            return false;
        };

        job.preview
            .engine()
            .lock()
            .set_viewport(planned.clone(), transform);
        job.live.set_viewport(planned, transform);
        debug!(
            "Canvas resized to {}x{} px ({:.3} px/mm)",
            width,
            height,
            transform.scale()
        );
        true
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        self.state.lock().canvas
    }

    /// Download the device's stored command stream and load it.
    ///
    /// A failed download leaves the current plan untouched.
    pub async fn load_from_device(&self, api: &dyn DeviceApi) -> muralkit_core::Result<Arc<PathModel>> {
        let timeout = Duration::from_millis(COMMANDS_DOWNLOAD_TIMEOUT_MS);
        let text = match api.download_commands(timeout).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Loading commands from device failed: {}", e);
                self.bus.publish(AppEvent::Error(ErrorEvent::Error {
                    title: "Load from device".to_string(),
                    message: e.to_string(),
                }));
                return Err(e.into());
            }
        };
        Ok(self.load_commands(&text).await?)
    }

    pub fn model(&self) -> Option<Arc<PathModel>> {
        self.state.lock().job.as_ref().map(|job| Arc::clone(&job.model))
    }

    /// Choose where the next job resumes, as a percentage of the plan.
    ///
    /// An idle preview moves its cursor and marker to the new start.
    /// Returns `None` without a loaded plan.
    pub fn select_start_percent(&self, percent: f64) -> Option<ResumePoint> {
        let mut state = self.state.lock();
        let job = state.job.as_mut()?;
        let resume = find_start_by_percent(&job.model, percent);

        job.live.set_resume_distance(resume.start_dist);
        if !job.preview.is_running() {
            job.preview.seek(resume.start_dist);
        }
        state.resume = resume;
        debug!(
            "Start selected: line {} at {:.1}mm ({:.1}%)",
            resume.start_line, resume.start_dist, resume.percent
        );
        Some(resume)
    }

    pub fn resume_point(&self) -> ResumePoint {
        self.state.lock().resume
    }

    /// Start the preview from the resume point. Returns `false` without a plan.
    pub fn start_simulation(&self) -> bool {
        let state = self.state.lock();
        match state.job.as_ref() {
            Some(job) => {
                job.preview.start(state.resume.start_dist);
                true
            }
            None => false,
        }
    }

    pub fn stop_simulation(&self) -> bool {
        self.state
            .lock()
            .job
            .as_ref()
            .is_some_and(|job| job.preview.stop())
    }

    pub fn preview_status(&self) -> Option<SimulationStatus> {
        self.state.lock().job.as_ref().map(|job| job.preview.status())
    }

    /// Base pen speed used by the preview, e.g. from the device diagnostics
    pub fn set_feed_rate(&self, mm_per_sec: f64) {
        self.update_sim_config(|cfg| cfg.feed_rate_mm_s = mm_per_sec);
    }

    pub fn set_speed_multiplier(&self, multiplier: f64) {
        self.update_sim_config(|cfg| cfg.speed_multiplier = multiplier);
    }

    fn update_sim_config(&self, change: impl FnOnce(&mut SimulationConfig)) {
        let mut state = self.state.lock();
        change(&mut state.sim_config);
        let config = state.sim_config;
        if let Some(job) = state.job.as_ref() {
            job.preview.engine().lock().set_config(config);
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        self.state.lock().sim_config
    }

    /// The device started a job from the selected resume point.
    ///
    /// Any running preview is stopped first.
    pub fn job_started(&self, now: Instant) {
        let event = {
            let mut state = self.state.lock();
            let resume = state.resume;
            let total = state.job.as_ref().map(|job| job.model.total_distance());
            if let Some(job) = state.job.as_mut() {
                job.preview.stop();
                job.live.job_started(resume.start_dist);
            }
            state.finish.reset();

            let event = AppEvent::Job(JobEvent::Started {
                start_line: resume.start_line,
                start_dist_mm: resume.start_dist,
                total_distance_mm: total,
            });
            state.timer.handle_event(&event, now);
            event
        };

        info!("{}", event.description());
        self.bus.publish(event);
    }

    /// Tracking of the current job stopped.
    pub fn job_stopped(&self, now: Instant) {
        let event = AppEvent::Job(JobEvent::Stopped);
        self.state.lock().timer.handle_event(&event, now);
        info!("Job tracking stopped");
        self.bus.publish(event);
    }

    /// Apply one telemetry sample received at `now`.
    pub fn apply_telemetry(&self, sample: TelemetrySample, now: Instant) -> TelemetryUpdate {
        let mut events = vec![AppEvent::Telemetry(TelemetryEvent::Sample(sample))];

        let update = {
            let mut state = self.state.lock();
            let live = state
                .job
                .as_mut()
                .map(|job| job.live.on_telemetry(&sample));

            let mut stats = state
                .timer
                .handle_event(&events[0], now)
                .unwrap_or_else(|| state.timer.stats());

            let finished = state.finish.observe(&sample);
            if let Some(progress) = finished {
                let event = AppEvent::Job(JobEvent::Finished { progress });
                state.timer.handle_event(&event, now);
                stats = state.timer.stats();
                events.push(event);
            }

            TelemetryUpdate {
                live,
                stats,
                finished,
            }
        };

        if let Some(progress) = update.finished {
            info!("Job finished at {:.0}%", progress);
        }
        for event in events {
            self.bus.publish(event);
        }
        update
    }

    /// Apply a poller event; failures are published and otherwise ignored.
    pub fn apply_poll_event(&self, event: PollEvent, now: Instant) -> Option<TelemetryUpdate> {
        match event {
            PollEvent::Status(status) => Some(self.apply_telemetry(status.to_sample(), now)),
            PollEvent::Failed(e) => {
                self.bus
                    .publish(AppEvent::Telemetry(TelemetryEvent::FetchFailed {
                        reason: e.to_string(),
                    }));
                None
            }
        }
    }

    pub fn stats(&self) -> JobStats {
        self.state.lock().timer.stats()
    }

    /// Start polling `api` at the tuned interval.
    ///
    /// The returned receiver survives interval changes. Must be called from
    /// within a tokio runtime.
    pub fn start_polling(&self, api: Arc<dyn DeviceApi>) -> mpsc::Receiver<PollEvent> {
        let (tx, rx) = mpsc::channel(POLL_EVENT_CAPACITY);
        let interval_ms = self.state.lock().tuning.status_poll_ms;
        *self.polling.lock() = Some(Polling::spawn(api, tx, interval_ms));
        rx
    }

    pub fn stop_polling(&self) -> bool {
        self.polling.lock().take().is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
            .lock()
            .as_ref()
            .is_some_and(|p| p.handle.is_running())
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.polling.lock().as_ref().map(|p| p.handle.interval())
    }

    pub fn tuning(&self) -> UiTuning {
        self.state.lock().tuning
    }

    /// Apply new tuning.
    ///
    /// Parse and draw chunk sizes apply to the next load, the frame cap to
    /// the running preview. A changed poll interval restarts the poller.
    /// Returns whether polling was restarted.
    pub fn set_tuning(&self, tuning: UiTuning) -> bool {
        let (previous, config) = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.tuning, tuning);
            state.sim_config.preview_fps = tuning.preview_fps;
            (previous, state.sim_config)
        };
        if let Some(job) = self.state.lock().job.as_ref() {
            job.preview.engine().lock().set_config(config);
        }

        for limits in ALL_LIMITS {
            let (old, new) = (previous.get(limits.key), tuning.get(limits.key));
            if let (Some(old), Some(new)) = (old, new) {
                if old != new {
                    self.bus
                        .publish(AppEvent::Settings(SettingsEvent::TuningChanged {
                            key: limits.key.to_string(),
                            value: new,
                        }));
                }
            }
        }

        if previous.status_poll_ms == tuning.status_poll_ms {
            return false;
        }

        let mut polling = self.polling.lock();
        match polling.take() {
            Some(old) => {
                let (api, events) = (Arc::clone(&old.api), old.events.clone());
                drop(old);
                *polling = Some(Polling::spawn(api, events, tuning.status_poll_ms));
                info!("Polling restarted at {}ms", tuning.status_poll_ms);
                true
            }
            None => false,
        }
    }

    /// Preview layers as an SVG document
    pub fn preview_svg(&self) -> Option<String> {
        let state = self.state.lock();
        let job = state.job.as_ref()?;
        let engine = job.preview.engine().lock();
        let (w, h) = state.canvas;
        Some(svg_document(
            w,
            h,
            &[engine.base_layer(), engine.overlay_layer()],
        ))
    }

    /// Live layers as an SVG document
    pub fn live_svg(&self) -> Option<String> {
        let state = self.state.lock();
        let job = state.job.as_ref()?;
        let (w, h) = state.canvas;
        Some(svg_document(
            w,
            h,
            &[job.live.base_layer(), job.live.overlay_layer()],
        ))
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for token in [state.parse_token.take(), state.resize_token.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for JobSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("JobSession")
            .field("canvas", &state.canvas)
            .field("tuning", &state.tuning)
            .field("resume", &state.resume)
            .field("loaded", &state.job.is_some())
            .finish()
    }
}
