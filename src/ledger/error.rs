use std::path::PathBuf;

use thiserror::Error;

/// Errors that make the ledger unusable.
///
/// Every variant is fatal to a run: without a working ledger the pipeline
/// cannot tell which records were already deleted.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to open ledger {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append '{id}' to ledger: {source}")]
    Write {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode ledger entry: {0}")]
    Encode(#[from] csv::Error),

    #[error("Failed to flush ledger: {0}")]
    Flush(#[source] std::io::Error),

    #[error("Ledger is closed")]
    Closed,

    #[error("Invalid ledger entry id: {0:?}")]
    InvalidId(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
