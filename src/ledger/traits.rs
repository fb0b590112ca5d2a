use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::error::{LedgerError, LedgerResult};

/// A record that has been deleted remotely and must not be attempted again.
///
/// Persisted as one headerless CSV record `id,processedAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Record id as it appears in the archive.
    pub id: String,
    /// When the remote deletion was confirmed.
    #[serde(with = "rfc3339_millis")]
    pub processed_at: DateTime<Utc>,
}

/// Reasons a persisted ledger record could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("missing timestamp field")]
    MissingTimestamp,

    #[error("empty id")]
    EmptyId,

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("expected 2 fields, found {0}")]
    UnexpectedFields(usize),
}

/// `DateTime<Utc>` as RFC 3339 with exactly three fractional digits.
mod rfc3339_millis {
    use super::*;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Truncate a DateTime to millisecond precision.
///
/// The persisted form carries milliseconds only; truncating up front keeps an
/// entry equal to itself after a write and reload.
fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
}

/// Reader settings shared by every ledger load.
pub(crate) fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).trim(Trim::All);
    builder
}

impl LedgerEntry {
    /// Create an entry stamped with the current time.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_timestamp(id, Utc::now())
    }

    /// Create an entry with an explicit timestamp.
    pub fn with_timestamp(id: impl Into<String>, processed_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            processed_at: truncate_to_millis(processed_at),
        }
    }

    /// Encode as a newline-terminated CSV record.
    pub fn to_line(&self) -> LedgerResult<String> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::with_capacity(64));
        writer.serialize(self)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| LedgerError::Encode(e.into_error().into()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decode one CSV record.
    ///
    /// The timestamp must be a complete RFC 3339 value. A record cut short by
    /// a crash never carries the trailing `Z` offset and is rejected.
    pub fn from_record(record: &StringRecord) -> Result<Self, LineError> {
        match record.len() {
            0 | 1 => return Err(LineError::MissingTimestamp),
            2 => {}
            n => return Err(LineError::UnexpectedFields(n)),
        }
        if record[0].is_empty() {
            return Err(LineError::EmptyId);
        }

        let entry: LedgerEntry = record
            .deserialize(None)
            .map_err(|_| LineError::InvalidTimestamp(record[1].to_string()))?;
        Ok(Self::with_timestamp(entry.id, entry.processed_at))
    }
}

/// Reject ids that would need CSV quoting.
///
/// Unquoted records keep a torn final record from swallowing the next one.
pub(crate) fn validate_id(id: &str) -> LedgerResult<()> {
    if id.is_empty() || id.contains([',', '"', '\n', '\r']) {
        return Err(LedgerError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Counters collected while loading a persisted ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Entries loaded into the index.
    pub entries: usize,
    /// Lines skipped because they could not be decoded.
    pub malformed: usize,
    /// Lines skipped because their id was already loaded.
    pub duplicates: usize,
    /// Whether the file ended in an unterminated line that had to be fenced off.
    pub repaired_tail: bool,
}

/// Durable record of processed ids.
///
/// Implementations must serialize appends: concurrent callers never see
/// interleaved writes and an id is written at most once.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether `id` has already been processed.
    async fn contains(&self, id: &str) -> bool;

    /// Persist an entry.
    ///
    /// Returns `Ok(false)` without writing when the id is already present.
    /// Returns only after the entry is durable.
    async fn append(&self, entry: LedgerEntry) -> LedgerResult<bool>;

    /// Number of entries.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All entries in the order they were recorded.
    async fn entries(&self) -> Vec<LedgerEntry>;

    /// Flush and release the underlying resource. Safe to call more than once.
    async fn close(&self) -> LedgerResult<()>;
}
