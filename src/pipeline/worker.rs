use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    archive::CandidateRecord,
    ledger::{Ledger, LedgerEntry, LedgerResult, validate_id},
    ratelimit::{Clock, RateLimiter, TokioClock},
    remote::{DeleteFailure, RemoteDeleter},
};

/// What happened to a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The ledger already had the id; no remote call was made.
    AlreadyProcessed,
    /// Deleted remotely and recorded in the ledger.
    Deleted,
    /// The remote call failed. Not recorded, not retried.
    Failed(DeleteFailure),
    /// The id cannot be recorded in the ledger, so it is never deleted.
    InvalidId,
    /// Cancelled before a remote call was started.
    Cancelled,
    /// Dry run: would have been deleted.
    DryRun,
}

/// Per-record unit of work.
///
/// Shared by every task of a run; holds no per-record state.
pub struct DeletionWorker<C: Clock = TokioClock> {
    ledger: Arc<dyn Ledger>,
    remote: Arc<dyn RemoteDeleter>,
    limiter: Arc<RateLimiter<C>>,
    in_flight: Option<Arc<Semaphore>>,
    dry_run: bool,
}

impl<C: Clock> DeletionWorker<C> {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        remote: Arc<dyn RemoteDeleter>,
        limiter: Arc<RateLimiter<C>>,
    ) -> Self {
        Self {
            ledger,
            remote,
            limiter,
            in_flight: None,
            dry_run: false,
        }
    }

    /// Bound the number of outstanding remote calls. Zero means unbounded.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.in_flight = (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight)));
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process one candidate.
    ///
    /// Remote failures are reported as [`Outcome::Failed`]. Only a ledger
    /// failure is returned as an error, since progress can no longer be
    /// recorded durably.
    pub async fn process(
        &self,
        record: &CandidateRecord,
        cancel: &CancellationToken,
    ) -> LedgerResult<Outcome> {
        let id = record.id.as_str();

        // A deletion that cannot be recorded would be repeated on every rerun
        if let Err(e) = validate_id(id) {
            tracing::warn!(id = ?id, error = %e, "Skipping record the ledger cannot store");
            return Ok(Outcome::InvalidId);
        }

        if self.ledger.contains(id).await {
            tracing::debug!(id = %id, "Already processed, skipping");
            return Ok(Outcome::AlreadyProcessed);
        }

        if self.dry_run {
            tracing::info!(id = %id, "Would delete");
            return Ok(Outcome::DryRun);
        }

        // Held until the remote call returns.
        let _permit = match &self.in_flight {
            Some(semaphore) => {
                let acquired = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.clone().acquire_owned() => permit.ok(),
                };
                match acquired {
                    Some(permit) => Some(permit),
                    None => return Ok(Outcome::Cancelled),
                }
            }
            None => None,
        };

        if self.limiter.admit_or_cancel(cancel).await.is_none() {
            tracing::debug!(id = %id, "Cancelled while waiting for admission");
            return Ok(Outcome::Cancelled);
        }

        match self.remote.delete_by_id(id).await {
            Ok(remote_id) => {
                let inserted = self.ledger.append(LedgerEntry::new(id)).await?;
                if !inserted {
                    tracing::debug!(id = %id, "Ledger already held id after deletion");
                }
                tracing::info!(id = %id, remote_id = %remote_id, "Deleted");
                Ok(Outcome::Deleted)
            }
            Err(failure) => {
                tracing::warn!(id = %id, reason = %failure, "Failed to delete");
                Ok(Outcome::Failed(failure))
            }
        }
    }
}
