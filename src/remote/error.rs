use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a single remote deletion did not succeed.
///
/// These never abort a run; the record simply stays eligible for the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteFailure {
    #[error("record not found")]
    NotFound,

    #[error("rate limited by remote (resets at {})", fmt_reset(.reset))]
    RateLimited { reset: Option<DateTime<Utc>> },

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote did not confirm the deletion")]
    NotConfirmed,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

fn fmt_reset(reset: &Option<DateTime<Utc>>) -> String {
    reset
        .map(|r| r.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Errors constructing a remote client.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote.auth is not configured or has a blank credential")]
    MissingCredentials,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
