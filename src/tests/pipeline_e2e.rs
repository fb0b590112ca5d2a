use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    archive::{Archive, CandidateRecord, StaticArchive},
    ledger::{FileLedger, Ledger, LedgerEntry, LedgerError, LedgerResult, MemoryLedger},
    pipeline::{BatchCoordinator, CoordinatorState, PipelineError},
    ratelimit::{Clock, ManualClock, RateLimiter},
    remote::{DeleteFailure, RemoteDeleter, RemoteId},
};

/// Remote API fake that records every call.
#[derive(Default)]
struct FakeRemote {
    calls: Mutex<Vec<(String, Option<Instant>)>>,
    failing: HashSet<String>,
    clock: Option<Arc<ManualClock>>,
    cancel_on_first_call: Option<CancellationToken>,
}

impl FakeRemote {
    fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    fn ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl RemoteDeleter for FakeRemote {
    async fn delete_by_id(&self, id: &str) -> Result<RemoteId, DeleteFailure> {
        let at = self.clock.as_ref().map(|clock| clock.now());
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((id.to_string(), at));
            calls.len() == 1
        };
        if first && let Some(cancel) = &self.cancel_on_first_call {
            cancel.cancel();
        }

        if self.failing.contains(id) {
            Err(DeleteFailure::Status {
                status: 500,
                body: "internal error".to_string(),
            })
        } else {
            Ok(RemoteId(id.to_string()))
        }
    }
}

/// Ledger that fails to persist one id.
struct BrokenLedger {
    inner: MemoryLedger,
    broken_id: &'static str,
}

#[async_trait]
impl Ledger for BrokenLedger {
    async fn contains(&self, id: &str) -> bool {
        self.inner.contains(id).await
    }

    async fn append(&self, entry: LedgerEntry) -> LedgerResult<bool> {
        if entry.id == self.broken_id {
            return Err(LedgerError::Write {
                id: entry.id,
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.append(entry).await
    }

    async fn len(&self) -> usize {
        self.inner.len().await
    }

    async fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.entries().await
    }

    async fn close(&self) -> LedgerResult<()> {
        self.inner.close().await
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

fn unlimited() -> Arc<RateLimiter<ManualClock>> {
    Arc::new(RateLimiter::with_clock(
        450,
        Duration::from_secs(900),
        ManualClock::new(),
    ))
}

async fn ledger_ids(path: &std::path::Path) -> Vec<String> {
    let (entries, _) = FileLedger::inspect(path).await.unwrap();
    entries.into_iter().map(|entry| entry.id).collect()
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_only_unengaged_records_are_deleted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    let remote = Arc::new(FakeRemote::default());

    let summary = BatchCoordinator::new(
        archive(&[("A", 0), ("B", 5), ("C", 0)]),
        &path,
        remote.clone(),
        unlimited(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(sorted(remote.ids()), ["A", "C"]);
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.deleted, 2);
    assert_eq!(sorted(ledger_ids(&path).await), ["A", "C"]);
}

#[tokio::test]
async fn test_ledgered_records_are_skipped() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    std::fs::write(&path, LedgerEntry::new("A").to_line().unwrap()).unwrap();
    let remote = Arc::new(FakeRemote::default());

    let summary = BatchCoordinator::new(
        archive(&[("A", 0), ("B", 5), ("C", 0)]),
        &path,
        remote.clone(),
        unlimited(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(remote.ids(), ["C"]);
    assert_eq!(summary.already_processed, 1);
    assert_eq!(summary.attempted, 1);
    assert_eq!(ledger_ids(&path).await, ["A", "C"]);
}

#[tokio::test]
async fn test_failure_does_not_stop_the_run() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    let remote = Arc::new(FakeRemote::failing(&["C"]));

    let mut coordinator = BatchCoordinator::new(
        archive(&[("A", 0), ("B", 5), ("C", 0), ("D", 0)]),
        &path,
        remote.clone(),
        unlimited(),
    );
    let summary = coordinator.run().await.unwrap();

    assert_eq!(coordinator.state(), CoordinatorState::Closed);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.failed, 1);
    // Final ledger = initial (empty) + succeeded
    assert_eq!(sorted(ledger_ids(&path).await), ["A", "D"]);
}

#[tokio::test]
async fn test_rerun_makes_no_remote_calls() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    let records = [("A", 0), ("B", 0), ("C", 0)];

    let first = Arc::new(FakeRemote::default());
    BatchCoordinator::new(archive(&records), &path, first.clone(), unlimited())
        .run()
        .await
        .unwrap();
    assert_eq!(first.ids().len(), 3);

    let second = Arc::new(FakeRemote::default());
    let summary = BatchCoordinator::new(archive(&records), &path, second.clone(), unlimited())
        .run()
        .await
        .unwrap();

    assert!(second.ids().is_empty());
    assert_eq!(summary.already_processed, 3);
    assert_eq!(summary.attempted, 0);
    assert_eq!(ledger_ids(&path).await.len(), 3);
}

#[tokio::test]
async fn test_rerun_retries_previous_failures_only() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    let records = [("A", 0), ("B", 0)];

    BatchCoordinator::new(
        archive(&records),
        &path,
        Arc::new(FakeRemote::failing(&["B"])),
        unlimited(),
    )
    .run()
    .await
    .unwrap();

    let remote = Arc::new(FakeRemote::default());
    BatchCoordinator::new(archive(&records), &path, remote.clone(), unlimited())
        .run()
        .await
        .unwrap();

    assert_eq!(remote.ids(), ["B"]);
}

#[tokio::test]
async fn test_starts_never_exceed_rate() {
    const RATE: usize = 3;
    const WINDOW: Duration = Duration::from_secs(60);

    let clock = Arc::new(ManualClock::new());
    let remote = Arc::new(FakeRemote {
        clock: Some(clock.clone()),
        ..Default::default()
    });
    let limiter = Arc::new(RateLimiter::with_clock(RATE as u32, WINDOW, clock.clone()));
    let records: Vec<_> = (0..10).map(|i| CandidateRecord::new(i.to_string(), 0)).collect();

    let summary = BatchCoordinator::new(
        Arc::new(StaticArchive::new(records)),
        "unused",
        remote.clone(),
        limiter,
    )
    .with_ledger(Arc::new(MemoryLedger::new()))
    .run()
    .await
    .unwrap();

    assert_eq!(summary.deleted, 10);

    let mut times = remote.times();
    times.sort();
    assert_eq!(times.len(), 10);
    for (i, start) in times.iter().enumerate() {
        let in_window = times[i..]
            .iter()
            .take_while(|t| t.duration_since(*start) < WINDOW)
            .count();
        assert!(in_window <= RATE, "{in_window} starts within one window");
    }
    // 10 calls at 3 per window need at least four windows
    assert!(times[9].duration_since(times[0]) >= WINDOW * 3);
}

#[tokio::test]
async fn test_partial_tail_is_reattempted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    // Crash mid-append: the line for C never got its timestamp or newline
    let contents = format!("{}C,2021-04-2", LedgerEntry::new("A").to_line().unwrap());
    std::fs::write(&path, contents).unwrap();

    let remote = Arc::new(FakeRemote::default());
    let summary = BatchCoordinator::new(
        archive(&[("A", 0), ("C", 0)]),
        &path,
        remote.clone(),
        unlimited(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(remote.ids(), ["C"]);
    assert_eq!(summary.already_processed, 1);

    let (entries, stats) = FileLedger::inspect(&path).await.unwrap();
    let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["A", "C"]);
    assert_eq!(stats.malformed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_failure_aborts_run() {
    let ledger = Arc::new(BrokenLedger {
        inner: MemoryLedger::new(),
        broken_id: "B",
    });
    let remote = Arc::new(FakeRemote::default());
    let limiter = Arc::new(RateLimiter::with_clock(
        1,
        Duration::from_secs(60),
        crate::ratelimit::TokioClock,
    ));

    let mut coordinator = BatchCoordinator::new(
        archive(&[("A", 0), ("B", 0), ("C", 0), ("D", 0)]),
        "unused",
        remote.clone(),
        limiter,
    )
    .with_ledger(ledger.clone());

    let err = coordinator.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Ledger(LedgerError::Write { .. })));
    assert_eq!(coordinator.state(), CoordinatorState::Closed);
    assert_eq!(remote.ids(), ["A", "B"]);
    assert!(ledger.inner.is_closed());
    assert_eq!(ledger.entries().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_drains_in_flight_call() {
    let cancel = CancellationToken::new();
    let remote = Arc::new(FakeRemote {
        cancel_on_first_call: Some(cancel.clone()),
        ..Default::default()
    });
    let ledger = Arc::new(MemoryLedger::new());
    let limiter = Arc::new(RateLimiter::with_clock(
        1,
        Duration::from_secs(60),
        crate::ratelimit::TokioClock,
    ));

    let summary = BatchCoordinator::new(
        archive(&[("A", 0), ("B", 0), ("C", 0)]),
        "unused",
        remote.clone(),
        limiter,
    )
    .with_ledger(ledger.clone())
    .with_cancellation(cancel)
    .run()
    .await
    .unwrap();

    // The call that was already under way completes and is recorded
    assert_eq!(remote.ids(), ["A"]);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.cancelled, 2);
    assert!(ledger.contains("A").await);
    assert!(ledger.is_closed());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("deleted_tweets.csv");
    let remote = Arc::new(FakeRemote::default());

    let summary = BatchCoordinator::new(
        archive(&[("A", 0), ("B", 0)]),
        &path,
        remote.clone(),
        unlimited(),
    )
    .with_cancellation(cancel)
    .run()
    .await
    .unwrap();

    assert!(remote.ids().is_empty());
    assert_eq!(summary.cancelled, 2);
    assert!(ledger_ids(&path).await.is_empty());
}

#[tokio::test]
async fn test_unrecordable_id_is_skipped_without_remote_call() {
    let ledger = Arc::new(MemoryLedger::new());
    let remote = Arc::new(FakeRemote::default());

    let mut coordinator = BatchCoordinator::new(
        archive(&[("1,2", 0), ("3", 0)]),
        "unused",
        remote.clone(),
        unlimited(),
    )
    .with_ledger(ledger.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(coordinator.state(), CoordinatorState::Closed);
    assert_eq!(remote.ids(), ["3"]);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.deleted, 1);
    assert!(ledger.contains("3").await);
    assert!(!ledger.contains("1,2").await);
}
