use std::{collections::HashSet, fmt, path::PathBuf, sync::Arc};

use tokio::{
    task::JoinSet,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use super::{
    error::{PipelineError, PipelineResult},
    worker::{DeletionWorker, Outcome},
};
use crate::{
    archive::{Archive, CandidateRecord, select_unengaged},
    config::RunConfig,
    ledger::{FileLedger, Ledger, MemoryLedger},
    ratelimit::{Clock, RateLimiter, TokioClock},
    remote::RemoteDeleter,
};

/// Lifecycle of a run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoordinatorState {
    Idle,
    Loading,
    Dispatching,
    Draining,
    Closed,
}

/// Aggregated outcomes of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records matching the selection predicate.
    pub selected: usize,
    /// Selected records found in the ledger.
    pub already_processed: usize,
    /// Remote calls made.
    pub attempted: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Records skipped because their id cannot be stored in the ledger.
    pub invalid: usize,
    /// Records never attempted because the run was cancelled.
    pub cancelled: usize,
    pub dry_run: usize,
    pub duration: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyProcessed => self.already_processed += 1,
            Outcome::Deleted => {
                self.attempted += 1;
                self.deleted += 1;
            }
            Outcome::Failed(_) => {
                self.attempted += 1;
                self.failed += 1;
            }
            Outcome::InvalidId => self.invalid += 1,
            Outcome::Cancelled => self.cancelled += 1,
            Outcome::DryRun => self.dry_run += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "selected:          {}", self.selected)?;
        writeln!(f, "already processed: {}", self.already_processed)?;
        writeln!(f, "attempted:         {}", self.attempted)?;
        writeln!(f, "deleted:           {}", self.deleted)?;
        writeln!(f, "failed:            {}", self.failed)?;
        if self.invalid > 0 {
            writeln!(f, "invalid ids:       {}", self.invalid)?;
        }
        writeln!(f, "cancelled:         {}", self.cancelled)?;
        if self.dry_run > 0 {
            writeln!(f, "would delete:      {}", self.dry_run)?;
        }
        write!(f, "duration:          {:.1?}", self.duration)
    }
}

enum LedgerSource {
    Path(PathBuf),
    Shared(Arc<dyn Ledger>),
}

/// Drives one deletion run from archive to closed ledger.
///
/// Every candidate not yet in the ledger gets its own task; the rate limiter
/// alone decides when each one may start its remote call. A fatal ledger
/// error cancels admissions, lets in-flight calls finish, closes the ledger
/// and is returned. Cancelling the token from outside does the same minus
/// the error.
pub struct BatchCoordinator<C: Clock = TokioClock> {
    archive: Arc<dyn Archive>,
    ledger: LedgerSource,
    remote: Arc<dyn RemoteDeleter>,
    limiter: Arc<RateLimiter<C>>,
    options: RunConfig,
    cancel: CancellationToken,
    state: CoordinatorState,
}

impl<C: Clock + 'static> BatchCoordinator<C> {
    /// Coordinator that opens the file ledger at `ledger_path` when run.
    pub fn new(
        archive: Arc<dyn Archive>,
        ledger_path: impl Into<PathBuf>,
        remote: Arc<dyn RemoteDeleter>,
        limiter: Arc<RateLimiter<C>>,
    ) -> Self {
        Self {
            archive,
            ledger: LedgerSource::Path(ledger_path.into()),
            remote,
            limiter,
            options: RunConfig::default(),
            cancel: CancellationToken::new(),
            state: CoordinatorState::Idle,
        }
    }

    /// Use an already-open ledger instead of a file path.
    ///
    /// The coordinator still closes it at the end of the run.
    pub fn with_ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = LedgerSource::Shared(ledger);
        self
    }

    pub fn with_options(mut self, options: RunConfig) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn advance(&mut self, next: CoordinatorState) -> PipelineResult<()> {
        if next <= self.state {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = ?self.state, to = ?next, "Coordinator state transition");
        self.state = next;
        Ok(())
    }

    /// Execute the run. A coordinator runs at most once.
    pub async fn run(&mut self) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        self.advance(CoordinatorState::Loading)?;

        let records = self.archive.records().await?;
        let total = records.len();
        let selected = dedupe(select_unengaged(records));
        tracing::info!(
            total,
            selected = selected.len(),
            "Selected records with no engagement"
        );

        let ledger = self.open_ledger().await?;

        let mut summary = RunSummary {
            selected: selected.len(),
            ..Default::default()
        };
        let mut pending = Vec::with_capacity(selected.len());
        for record in selected {
            if ledger.contains(&record.id).await {
                summary.already_processed += 1;
            } else {
                pending.push(record);
            }
        }

        self.advance(CoordinatorState::Dispatching)?;
        tracing::info!(
            pending = pending.len(),
            already_processed = summary.already_processed,
            max_per_window = self.limiter.max_per_window(),
            window_secs = self.limiter.window().as_secs(),
            dry_run = self.options.dry_run,
            "Dispatching deletions"
        );

        let worker = Arc::new(
            DeletionWorker::new(ledger.clone(), self.remote.clone(), self.limiter.clone())
                .with_max_in_flight(self.options.max_in_flight)
                .with_dry_run(self.options.dry_run),
        );
        let mut tasks = JoinSet::new();
        for record in pending {
            let worker = worker.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move { worker.process(&record, &cancel).await });
        }

        self.advance(CoordinatorState::Draining)?;
        let mut fatal: Option<PipelineError> = None;
        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok(Ok(outcome)) => {
                    summary.record(&outcome);
                    continue;
                }
                Ok(Err(e)) => PipelineError::Ledger(e),
                Err(e) => PipelineError::Task(e.to_string()),
            };
            tracing::error!(error = %error, "Aborting run, draining in-flight deletions");
            self.cancel.cancel();
            fatal.get_or_insert(error);
        }

        let closed = ledger.close().await;
        self.advance(CoordinatorState::Closed)?;
        summary.duration = started.elapsed();

        if let Some(error) = fatal {
            if let Err(e) = closed {
                tracing::error!(error = %e, "Failed to close ledger after fatal error");
            }
            return Err(error);
        }
        closed?;

        tracing::info!(
            selected = summary.selected,
            already_processed = summary.already_processed,
            attempted = summary.attempted,
            deleted = summary.deleted,
            failed = summary.failed,
            invalid = summary.invalid,
            cancelled = summary.cancelled,
            dry_run = summary.dry_run,
            duration_ms = summary.duration.as_millis() as u64,
            "Run complete"
        );
        Ok(summary)
    }

    async fn open_ledger(&self) -> PipelineResult<Arc<dyn Ledger>> {
        match &self.ledger {
            LedgerSource::Shared(ledger) => Ok(ledger.clone()),
            // Dry runs read the ledger but must not create or extend it.
            LedgerSource::Path(path) if self.options.dry_run => {
                let (entries, stats) = FileLedger::inspect(path).await?;
                tracing::debug!(path = ?path, entries = stats.entries, "Loaded ledger read-only");
                Ok(Arc::new(MemoryLedger::with_entries(entries)))
            }
            LedgerSource::Path(path) => Ok(Arc::new(FileLedger::open(path).await?)),
        }
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn dedupe(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        archive::StaticArchive,
        ledger::LedgerEntry,
        ratelimit::ManualClock,
        remote::{DeleteFailure, RemoteId},
    };

    #[derive(Default)]
    struct RecordingRemote {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteDeleter for RecordingRemote {
        async fn delete_by_id(&self, id: &str) -> Result<RemoteId, DeleteFailure> {
            self.calls.lock().unwrap().push(id.to_string());
            Ok(RemoteId(id.to_string()))
        }
    }

    fn archive(records: &[(&str, u64)]) -> Arc<dyn Archive> {
        Arc::new(StaticArchive::new(
            records
                .iter()
                .map(|(id, count)| CandidateRecord::new(*id, *count))
                .collect(),
        ))
    }

    fn limiter() -> Arc<RateLimiter<ManualClock>> {
        Arc::new(RateLimiter::with_clock(
            100,
            Duration::from_secs(900),
            ManualClock::new(),
        ))
    }

    #[tokio::test]
    async fn test_run_reaches_closed() {
        let ledger = Arc::new(MemoryLedger::new());
        let remote = Arc::new(RecordingRemote::default());
        let mut coordinator = BatchCoordinator::new(
            archive(&[("A", 0), ("B", 5), ("C", 0)]),
            "unused",
            remote.clone(),
            limiter(),
        )
        .with_ledger(ledger.clone());

        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        let summary = coordinator.run().await.unwrap();

        assert_eq!(coordinator.state(), CoordinatorState::Closed);
        assert_eq!(summary.selected, 2);
        assert_eq!(summary.deleted, 2);
        assert!(ledger.is_closed());
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let mut coordinator = BatchCoordinator::new(
            archive(&[]),
            "unused",
            Arc::new(RecordingRemote::default()),
            limiter(),
        )
        .with_ledger(Arc::new(MemoryLedger::new()));

        coordinator.run().await.unwrap();
        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: CoordinatorState::Closed,
                to: CoordinatorState::Loading,
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_archive_ids_called_once() {
        let remote = Arc::new(RecordingRemote::default());
        let mut coordinator = BatchCoordinator::new(
            archive(&[("A", 0), ("A", 0)]),
            "unused",
            remote.clone(),
            limiter(),
        )
        .with_ledger(Arc::new(MemoryLedger::new()));

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.selected, 1);
        assert_eq!(remote.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_file_ledger_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deleted.csv");
        std::fs::write(&path, LedgerEntry::new("A").to_line().unwrap()).unwrap();
        let before = std::fs::read(&path).unwrap();

        let remote = Arc::new(RecordingRemote::default());
        let mut coordinator = BatchCoordinator::new(
            archive(&[("A", 0), ("C", 0)]),
            &path,
            remote.clone(),
            limiter(),
        )
        .with_options(RunConfig {
            dry_run: true,
            max_in_flight: 0,
        });

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.already_processed, 1);
        assert_eq!(summary.dry_run, 1);
        assert!(remote.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_ledger_directory_is_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state/deleted.csv");

        let mut coordinator = BatchCoordinator::new(
            archive(&[("A", 0)]),
            &path,
            Arc::new(RecordingRemote::default()),
            limiter(),
        );
        coordinator.run().await.unwrap();

        let (entries, _) = FileLedger::inspect(&path).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "A");
    }

    #[tokio::test]
    async fn test_unopenable_ledger_never_closes() {
        let temp = TempDir::new().unwrap();
        // A directory where the file should be
        let path = temp.path().join("ledger");
        std::fs::create_dir(&path).unwrap();

        let mut coordinator = BatchCoordinator::new(
            archive(&[("A", 0)]),
            &path,
            Arc::new(RecordingRemote::default()),
            limiter(),
        );

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Ledger(_)));
        assert_eq!(coordinator.state(), CoordinatorState::Loading);
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            selected: 3,
            deleted: 2,
            failed: 1,
            attempted: 3,
            ..Default::default()
        };
        let text = summary.to_string();
        assert!(text.contains("deleted:           2"));
        assert!(!text.contains("would delete"));
    }
}
