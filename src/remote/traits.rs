use async_trait::async_trait;

use super::error::DeleteFailure;

/// Identifier the remote API reports for a deleted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteId(pub String);

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote API capable of deleting a record by id.
///
/// Implementations must be thread-safe; many workers call concurrently.
#[async_trait]
pub trait RemoteDeleter: Send + Sync {
    /// Delete a single record.
    ///
    /// Any error is per-record and must not be treated as fatal by callers.
    async fn delete_by_id(&self, id: &str) -> Result<RemoteId, DeleteFailure>;
}

/// Deleter that refuses every call.
///
/// Stands in for the real client in dry runs, where credentials may be absent
/// and no remote call is ever made.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDeleter;

#[async_trait]
impl RemoteDeleter for DisabledDeleter {
    async fn delete_by_id(&self, _id: &str) -> Result<RemoteId, DeleteFailure> {
        Err(DeleteFailure::Unauthorized(
            "remote deletion is disabled".to_string(),
        ))
    }
}
