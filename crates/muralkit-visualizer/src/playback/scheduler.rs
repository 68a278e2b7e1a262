//! Frame scheduling for the preview loop.
//!
//! A [`FrameScheduler`] runs a callback once on the next frame and hands
//! back a [`CancelToken`]; cancelling the token before the frame fires drops
//! the callback without running it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use muralkit_core::CancelToken;
use parking_lot::Mutex;
use tracing::warn;

/// One-shot frame callback, receiving the frame timestamp
pub type FrameCallback = Box<dyn FnOnce(Instant) + Send + 'static>;

/// Source of animation frames
pub trait FrameScheduler: Send + Sync {
    /// Run `callback` on the next frame unless the returned token is
    /// cancelled first.
    fn schedule(&self, callback: FrameCallback) -> CancelToken;
}

/// Frames driven by a tokio timer.
#[derive(Debug, Clone)]
pub struct TokioFrameScheduler {
    frame_interval: Duration,
}

impl TokioFrameScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }
}

impl Default for TokioFrameScheduler {
    /// ~60 Hz, a typical display refresh
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl FrameScheduler for TokioFrameScheduler {
    fn schedule(&self, callback: FrameCallback) -> CancelToken {
        let token = CancelToken::new();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime; frame dropped");
            token.cancel();
            return token;
        };

        let interval = self.frame_interval;
        let frame_token = token.clone();
        handle.spawn(async move {
            tokio::time::sleep(interval).await;
            if !frame_token.is_cancelled() {
                callback(Instant::now());
            }
        });

        token
    }
}

/// Scheduler whose frames are fired explicitly, for deterministic tests and
/// offline rendering.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<(CancelToken, FrameCallback)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks waiting for a frame, cancelled ones included
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Fire the next live callback with timestamp `now`.
    ///
    /// Cancelled callbacks are discarded on the way. Returns `false` when
    /// nothing was left to run.
    pub fn fire(&self, now: Instant) -> bool {
        loop {
            // The lock is released before running so the callback can reschedule
            let next = self.queue.lock().pop_front();
            match next {
                Some((token, callback)) => {
                    if token.is_cancelled() {
                        continue;
                    }
                    callback(now);
                    return true;
                }
                None => return false,
            }
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&self, callback: FrameCallback) -> CancelToken {
        let token = CancelToken::new();
        self.queue.lock().push_back((token.clone(), callback));
        token
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_manual_fire_order() {
        let scheduler = ManualScheduler::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let calls = Arc::clone(&calls);
            scheduler.schedule(Box::new(move |_| calls.lock().push(i)));
        }

        let now = Instant::now();
        while scheduler.fire(now) {}
        assert_eq!(*calls.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cancelled_frame_is_dropped() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let token = scheduler.schedule(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        token.cancel();

        assert!(!scheduler.fire(Instant::now()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_fires() {
        let scheduler = TokioFrameScheduler::new(Duration::from_millis(1));
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.schedule(Box::new(move |ts| {
            let _ = tx.send(ts);
        }));
        let fired = tokio::time::timeout(Duration::from_secs(2), rx).await;
        assert!(matches!(fired, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_tokio_scheduler_cancel() {
        let scheduler = TokioFrameScheduler::new(Duration::from_millis(20));
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let token = scheduler.schedule(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        token.cancel();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
