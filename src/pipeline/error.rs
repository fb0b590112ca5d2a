use thiserror::Error;

use super::coordinator::CoordinatorState;
use crate::{
    archive::ArchiveError, config::ConfigError, ledger::LedgerError, remote::RemoteError,
};

/// Errors that abort a whole run.
///
/// Per-record remote failures never surface here; they are counted in the
/// run summary instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Remote client error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("Invalid coordinator transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: CoordinatorState,
        to: CoordinatorState,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
