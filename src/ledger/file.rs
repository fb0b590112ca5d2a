use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};

use super::{
    error::{LedgerError, LedgerResult},
    index::LedgerIndex,
    traits::{Ledger, LedgerEntry, LoadStats, validate_id},
};

/// File-backed ledger.
///
/// Stores one headerless CSV record `id,processedAt` per deleted record in
/// an append-only file and keeps an in-memory index for membership checks. The file
/// handle lives behind a single async mutex, so appends are serialized and
/// each one is synced to disk before it is acknowledged.
pub struct FileLedger {
    /// Location of the persisted log.
    path: PathBuf,
    /// In-memory index (id -> entry), only mutated while holding `writer`.
    index: RwLock<LedgerIndex>,
    /// Append handle; `None` once closed.
    writer: Mutex<Option<File>>,
    /// What was found on disk at open time.
    stats: LoadStats,
}

impl FileLedger {
    /// Open a ledger, loading every entry already on disk.
    ///
    /// Missing files and parent directories are created. Malformed lines are
    /// skipped and counted in [`LoadStats`].
    pub async fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LedgerError::Open {
                    path: path.clone(),
                    source,
                })?;
        }

        let contents = read_existing(&path).await?;
        let (index, mut stats) = LedgerIndex::parse(&contents);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LedgerError::Open {
                path: path.clone(),
                source,
            })?;

        // Fence off an unterminated tail so the next entry starts on its own line
        if !contents.is_empty() && !contents.ends_with(b"\n") {
            file.write_all(b"\n")
                .await
                .map_err(|source| LedgerError::Open {
                    path: path.clone(),
                    source,
                })?;
            file.sync_data().await.map_err(LedgerError::Flush)?;
            stats.repaired_tail = true;
        }

        tracing::info!(
            path = ?path,
            entries = stats.entries,
            malformed = stats.malformed,
            duplicates = stats.duplicates,
            repaired_tail = stats.repaired_tail,
            "Loaded ledger from disk"
        );

        Ok(Self {
            path,
            index: RwLock::new(index),
            writer: Mutex::new(Some(file)),
            stats,
        })
    }

    /// Read a ledger without opening it for writing.
    pub async fn inspect(path: impl AsRef<Path>) -> LedgerResult<(Vec<LedgerEntry>, LoadStats)> {
        let path = path.as_ref();
        let contents = read_existing(path).await?;
        let (index, stats) = LedgerIndex::parse(&contents);
        Ok((index.entries().to_vec(), stats))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counters from the initial load.
    pub fn load_stats(&self) -> LoadStats {
        self.stats
    }
}

async fn read_existing(path: &Path) -> LedgerResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(LedgerError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn contains(&self, id: &str) -> bool {
        self.index.read().await.contains(id)
    }

    async fn append(&self, entry: LedgerEntry) -> LedgerResult<bool> {
        validate_id(&entry.id)?;

        let mut writer = self.writer.lock().await;
        let file = writer.as_mut().ok_or(LedgerError::Closed)?;

        if self.index.read().await.contains(&entry.id) {
            return Ok(false);
        }

        // Write to disk first
        let line = entry.to_line()?;
        let write_err = |source| LedgerError::Write {
            id: entry.id.clone(),
            source,
        };
        file.write_all(line.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        file.sync_data().await.map_err(write_err)?;

        // Update index
        self.index.write().await.insert(entry);
        Ok(true)
    }

    async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    async fn entries(&self) -> Vec<LedgerEntry> {
        self.index.read().await.entries().to_vec()
    }

    async fn close(&self) -> LedgerResult<()> {
        let mut writer = self.writer.lock().await;
        if let Some(mut file) = writer.take() {
            file.flush().await.map_err(LedgerError::Flush)?;
            file.sync_all().await.map_err(LedgerError::Flush)?;
            tracing::debug!(path = ?self.path, "Closed ledger");
        }
        Ok(())
    }
}
