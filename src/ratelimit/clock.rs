use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

/// Time source used by the rate limiter.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend until `deadline` has been reached.
    async fn sleep_until(&self, deadline: Instant);
}

/// Clock backed by the tokio timer.
///
/// Honours `tokio::time::pause`, so tests running with `start_paused` see
/// virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// Simulated clock whose time only moves when told to.
///
/// Sleeping jumps the clock straight to the deadline instead of waiting, so a
/// limiter driven by this clock runs to completion immediately while still
/// recording the start times it would have produced in real time.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep_until(&self, deadline: Instant) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if deadline > *current {
                *current = deadline;
            }
        }
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        (**self).sleep_until(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_jumps_forward() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.sleep_until(start + Duration::from_secs(900)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(900));

        // Sleeping into the past does not rewind
        clock.sleep_until(start).await;
        assert_eq!(clock.now() - start, Duration::from_secs(900));

        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now() - start, Duration::from_millis(900_005));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock;
        let start = clock.now();
        clock.sleep_until(start + Duration::from_secs(60)).await;
        assert!(clock.now() - start >= Duration::from_secs(60));
    }
}
