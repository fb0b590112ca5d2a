use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Remote API quota.
///
/// The remote deletion endpoint allows a fixed number of calls per rolling
/// window. Both values come from the API contract and should only change
/// when the provider changes its limits.
///
/// ```toml
/// [rate_limit]
/// window_ms = 900000    # 15 minutes
/// max_per_window = 450
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum calls started inside any window.
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_per_window: default_max_per_window(),
        }
    }
}

fn default_window_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max_per_window() -> u32 {
    450
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.window_ms == 0 {
            return Err("rate_limit.window_ms must be greater than zero".into());
        }
        if self.max_per_window == 0 {
            return Err("rate_limit.max_per_window must be greater than zero".into());
        }
        Ok(())
    }
}
