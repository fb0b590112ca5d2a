use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use super::clock::{Clock, TokioClock};
use crate::config::RateLimitConfig;

/// Sliding-window admission control.
///
/// Keeps the start instants of every admission inside the current window.
/// A caller is admitted once fewer than `max_per_window` starts remain within
/// the trailing `window`; otherwise it sleeps until the oldest start ages out.
///
/// Waiting callers queue on a fair mutex, so they are admitted in the order
/// they began waiting and none is starved while capacity frees up.
pub struct RateLimiter<C: Clock = TokioClock> {
    max_per_window: usize,
    window: Duration,
    clock: C,
    /// Start instants still inside the window, oldest first.
    starts: Mutex<VecDeque<Instant>>,
    admitted: AtomicU64,
}

impl RateLimiter<TokioClock> {
    /// Create a limiter driven by the tokio timer.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config.max_per_window, config.window(), TokioClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter with an explicit clock.
    ///
    /// A `max_per_window` of zero is treated as one.
    pub fn with_clock(max_per_window: u32, window: Duration, clock: C) -> Self {
        let max_per_window = max_per_window.max(1) as usize;
        Self {
            max_per_window,
            window,
            clock,
            starts: Mutex::new(VecDeque::with_capacity(max_per_window)),
            admitted: AtomicU64::new(0),
        }
    }

    /// Wait for a slot and claim it.
    ///
    /// Returns the instant the slot was granted. Dropping the returned future
    /// before it completes leaves the limiter untouched.
    pub async fn admit(&self) -> Instant {
        let mut starts = self.starts.lock().await;

        loop {
            let now = self.clock.now();
            while let Some(&oldest) = starts.front() {
                if now.saturating_duration_since(oldest) >= self.window {
                    starts.pop_front();
                } else {
                    break;
                }
            }

            if starts.len() < self.max_per_window {
                starts.push_back(now);
                self.admitted.fetch_add(1, Ordering::Relaxed);
                return now;
            }

            // Window is full: the earliest a slot frees up is when the oldest start expires
            let oldest = starts[0];
            let ready_at = oldest + self.window;
            tracing::debug!(
                in_window = starts.len(),
                wait_ms = ready_at.saturating_duration_since(now).as_millis() as u64,
                "Rate limit window full, waiting"
            );
            self.clock.sleep_until(ready_at).await;
        }
    }

    /// Like [`admit`](Self::admit), but gives up when `token` is cancelled.
    ///
    /// Returns `None` if cancellation happened first; no slot is consumed.
    pub async fn admit_or_cancel(&self, token: &CancellationToken) -> Option<Instant> {
        if token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            at = self.admit() => Some(at),
        }
    }

    /// Total admissions granted so far.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
