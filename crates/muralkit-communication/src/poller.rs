//! Fixed-interval `/status` polling
//!
//! Ticks that fire while a request is in flight are skipped until the
//! request is [`STALE_AFTER_INTERVALS`] intervals old; the next tick then
//! drops it and issues a fresh one. A slow device still reports, and a hung
//! request never blocks polling.

use std::sync::Arc;
use std::time::Duration;

use muralkit_core::NetworkError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::client::DeviceApi;
use crate::status::DeviceStatus;

/// Shortest allowed poll interval in milliseconds
pub const MIN_POLL_INTERVAL_MS: u64 = 80;

/// Age, in poll intervals, after which an in-flight request is superseded
pub const STALE_AFTER_INTERVALS: u32 = 3;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Outcome of one poll
#[derive(Debug, Clone)]
pub enum PollEvent {
    Status(DeviceStatus),
    Failed(NetworkError),
}

pub struct TelemetryPoller {
    api: Arc<dyn DeviceApi>,
    interval: Duration,
}

impl TelemetryPoller {
    /// Poll `api` every `interval_ms`, clamped to [`MIN_POLL_INTERVAL_MS`].
    pub fn new(api: Arc<dyn DeviceApi>, interval_ms: u64) -> Self {
        Self {
            api,
            interval: Duration::from_millis(interval_ms.max(MIN_POLL_INTERVAL_MS)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling on the current tokio runtime.
    ///
    /// The task ends when the handle is stopped or dropped, or when the
    /// receiver is dropped.
    pub fn spawn(self) -> (PollerHandle, mpsc::Receiver<PollEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let interval = self.interval;
        debug!("Telemetry polling every {}ms", interval.as_millis());

        let task = tokio::spawn(poll_loop(self.api, interval, tx));
        (
            PollerHandle {
                task: Some(task),
                interval,
            },
            rx,
        )
    }
}

async fn poll_loop(api: Arc<dyn DeviceApi>, interval: Duration, tx: mpsc::Sender<PollEvent>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let stale_after = interval * STALE_AFTER_INTERVALS;

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }

        let mut fetch = api.fetch_status();
        let mut started = Instant::now();
        let result = loop {
            tokio::select! {
                result = &mut fetch => break result,
                _ = ticker.tick() => {
                    if started.elapsed() < stale_after {
                        trace!("Status request still in flight, tick skipped");
                        continue;
                    }
                    trace!("Stale status request superseded");
                    fetch = api.fetch_status();
                    started = Instant::now();
                }
            }
        };

        let event = match result {
            Ok(status) => PollEvent::Status(status),
            Err(e) => {
                warn!("Status poll failed: {}", e);
                PollEvent::Failed(e)
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
    debug!("Telemetry polling ended");
}

/// Owner of a running poll task; dropping it stops polling
#[derive(Debug)]
pub struct PollerHandle {
    task: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PollerHandle {
    /// Abort the poll task, dropping any in-flight request.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Telemetry polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
