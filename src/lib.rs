//! Resumable, rate-limited bulk deletion of zero-engagement tweets.
//!
//! Records are read from an archive export, filtered to those nobody engaged
//! with, and deleted through the remote API at no more than the configured
//! quota. Every successful deletion is appended to a durable ledger before it
//! counts, so an interrupted run picks up where it left off.

pub mod archive;
pub mod config;
pub mod ledger;
#[cfg(feature = "cli")]
pub mod observability;
pub mod pipeline;
pub mod ratelimit;
pub mod remote;

#[cfg(test)]
mod tests;

pub use archive::{Archive, CandidateRecord, TweetsJsArchive};
pub use config::ReaperConfig;
pub use ledger::{FileLedger, Ledger, LedgerEntry};
pub use pipeline::{BatchCoordinator, Outcome, PipelineError, RunSummary};
pub use ratelimit::RateLimiter;
pub use remote::{DeleteFailure, HttpDeleter, RemoteDeleter};
