use async_trait::async_trait;
use tally_types::ObjectId;

use crate::error::SyncResult;

/// Keeps a local mirror in step with the authoritative origin.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Initialize the mirror from the origin and return the local tip. The
    /// local branch starts at genesis when the origin has no branch yet.
    async fn attach(&self) -> SyncResult<ObjectId>;

    /// Discard local changes, fetch, and fast-forward the local branch to
    /// the origin's tip. Returns the new local tip. Any failure is fatal
    /// for the operation in progress.
    async fn synchronize(&self) -> SyncResult<ObjectId>;

    /// Publish `local_head`. `Ok(false)` means the origin moved ahead and
    /// the push was not a fast-forward.
    async fn push(&self, local_head: ObjectId) -> SyncResult<bool>;
}
