use serde::{Deserialize, Serialize};

/// Per-run behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Log what would be deleted without calling the remote API or writing
    /// the ledger.
    #[serde(default)]
    pub dry_run: bool,

    /// Upper bound on concurrently outstanding remote calls. 0 = unbounded
    /// (the rate limit alone governs throughput).
    #[serde(default)]
    pub max_in_flight: usize,
}
