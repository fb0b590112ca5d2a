use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    error::{LedgerError, LedgerResult},
    index::LedgerIndex,
    traits::{Ledger, LedgerEntry, validate_id},
};

/// Ledger that lives only in memory.
///
/// Used for dry runs, where nothing may be persisted, and as a test double.
#[derive(Default)]
pub struct MemoryLedger {
    index: RwLock<LedgerIndex>,
    closed: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger with existing entries.
    pub fn with_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let mut index = LedgerIndex::default();
        for entry in entries {
            index.insert(entry);
        }
        Self {
            index: RwLock::new(index),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn contains(&self, id: &str) -> bool {
        self.index.read().await.contains(id)
    }

    async fn append(&self, entry: LedgerEntry) -> LedgerResult<bool> {
        validate_id(&entry.id)?;
        let mut index = self.index.write().await;
        if self.is_closed() {
            return Err(LedgerError::Closed);
        }
        Ok(index.insert(entry))
    }

    async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    async fn entries(&self) -> Vec<LedgerEntry> {
        self.index.read().await.entries().to_vec()
    }

    async fn close(&self) -> LedgerResult<()> {
        // Taken under the write lock so no append can slip in after close
        let _index = self.index.write().await;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
