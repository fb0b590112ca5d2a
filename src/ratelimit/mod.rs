//! Admission control for the remote deletion API.
//!
//! The remote quota is expressed as "at most R calls per window W" (for
//! example 450 per 15 minutes). [`RateLimiter`] enforces that bound over a
//! sliding window and queues callers that arrive while it is full.

mod clock;
mod limiter;

pub use clock::{Clock, ManualClock, TokioClock};
pub use limiter::RateLimiter;
