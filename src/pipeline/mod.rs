//! The deletion pipeline.
//!
//! [`BatchCoordinator`] selects candidates from an archive, skips ids already
//! in the ledger and fans out one [`DeletionWorker`] task per remaining
//! record. Workers wait for rate-limit admission, call the remote API and
//! append successes to the ledger.

mod coordinator;
mod error;
mod worker;

pub use coordinator::{BatchCoordinator, CoordinatorState, RunSummary};
pub use error::{PipelineError, PipelineResult};
pub use worker::{DeletionWorker, Outcome};
