use std::path::Path;

use async_trait::async_trait;
use tally_types::ObjectId;

use crate::block::{Block, BlockDraft};
use crate::error::RepoResult;

/// The content-addressed repository a chain lives in.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Snapshot `directory` into tree objects and return the root tree ID.
    /// Writes locally only; never touches the network.
    async fn compute_tree_hash(&self, directory: &Path) -> RepoResult<ObjectId>;

    /// Write a block and return its hash. Identical drafts produce identical
    /// hashes. Fails with `ObjectWrite` if the backend refuses the object.
    async fn create_block(&self, draft: &BlockDraft) -> RepoResult<ObjectId>;

    /// Read a block back. `Ok(None)` if no such block exists.
    async fn read_block(&self, hash: &ObjectId) -> RepoResult<Option<Block>>;

    /// What a canonical ref name points at, if it exists.
    async fn resolve_ref(&self, name: &str) -> RepoResult<Option<ObjectId>>;

    /// Move `name` from `expected` to `to` atomically. Returns `false`, not an
    /// error, when the ref no longer points at `expected`.
    async fn advance_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        to: ObjectId,
    ) -> RepoResult<bool>;

    /// Reclaim objects no ref can reach. Returns how many were removed.
    /// Advisory; correctness never depends on it.
    async fn garbage_collect(&self) -> RepoResult<usize>;
}
