//! Creating origins.
//!
//! A fresh origin holds exactly one block: genesis, an empty tree with no
//! parents, tagged under the genesis reference. Its hash fixes the chain's
//! difficulty prefix.

use std::path::Path;

use tally_repo::git_store::parse_id;
use tally_repo::{BlockDraft, GitCli, GitObjectStore, ObjectStore};
use tally_store::Tree;
use tally_types::{BlockTime, ChainIdentity, ObjectId};
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::transport::LocalTransport;

/// Message of every genesis block.
pub const GENESIS_MESSAGE: &str = "genesis\n";

/// Write a genesis block into `origin` and tag it `genesis_ref`.
///
/// Fails with `OriginExists` if the tag is already present.
pub async fn seed_genesis(
    origin: &LocalTransport,
    identity: &ChainIdentity,
    genesis_ref: &str,
    date: BlockTime,
) -> SyncResult<ObjectId> {
    if let Some(existing) = origin.refs().resolve(genesis_ref)? {
        return Err(SyncError::OriginExists(format!("{genesis_ref} -> {existing}")));
    }
    let tree = origin.odb().write(&Tree::empty().to_stored_object()?)?;
    let draft = BlockDraft {
        tree,
        parents: Vec::new(),
        identity: identity.clone(),
        date,
        message: GENESIS_MESSAGE.to_string(),
    };
    let genesis = origin.odb().write(&draft.to_object().to_stored_object())?;
    if !origin.refs().compare_and_swap(genesis_ref, None, genesis)? {
        return Err(SyncError::OriginExists(genesis_ref.to_string()));
    }
    Ok(genesis)
}

/// Create a bare native origin in `dir` and return its genesis hash.
pub async fn init_native_origin(
    dir: &Path,
    identity: &ChainIdentity,
    genesis_ref: &str,
) -> SyncResult<ObjectId> {
    let origin = LocalTransport::open(dir)?;
    let genesis = seed_genesis(&origin, identity, genesis_ref, BlockTime::now()).await?;
    info!(origin = %dir.display(), %genesis, "native origin created");
    Ok(genesis)
}

/// Create a bare git origin in `dir` and return its genesis hash.
pub async fn init_git_origin(
    dir: &Path,
    identity: &ChainIdentity,
    genesis_ref: &str,
) -> SyncResult<ObjectId> {
    std::fs::create_dir_all(dir)?;
    let git = GitCli::new(dir);
    git.run(&["init", "--bare", "-q"]).await?;

    let store = GitObjectStore::with_cli(git.clone());
    if let Some(existing) = store.resolve_ref(genesis_ref).await? {
        return Err(SyncError::OriginExists(format!("{genesis_ref} -> {existing}")));
    }
    let empty_tree = git.run_with(&["mktree"], &[], Some(b"".as_slice())).await?;
    let tree = parse_id(&empty_tree)?;
    let genesis = store
        .create_block(&BlockDraft {
            tree,
            parents: Vec::new(),
            identity: identity.clone(),
            date: BlockTime::now(),
            message: GENESIS_MESSAGE.to_string(),
        })
        .await?;
    if !store.advance_ref(genesis_ref, None, genesis).await? {
        return Err(SyncError::OriginExists(genesis_ref.to_string()));
    }
    info!(origin = %dir.display(), %genesis, "git origin created");
    Ok(genesis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RemoteTransport;
    use tally_types::Person;

    fn identity() -> ChainIdentity {
        ChainIdentity::single(Person::new("Tally Miner", "miner@tally.local"))
    }

    #[tokio::test]
    async fn native_origin_has_tagged_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = init_native_origin(dir.path(), &identity(), "refs/tags/genesis")
            .await
            .unwrap();
        let origin = LocalTransport::open(dir.path()).unwrap();
        assert_eq!(
            origin.read_ref("refs/tags/genesis").await.unwrap(),
            Some(genesis)
        );
        assert!(matches!(
            init_native_origin(dir.path(), &identity(), "refs/tags/genesis").await,
            Err(SyncError::OriginExists(_))
        ));
    }

    #[tokio::test]
    async fn genesis_is_deterministic_for_a_fixed_date() {
        let a = LocalTransport::in_memory();
        let b = LocalTransport::in_memory();
        let date = BlockTime::new(1_700_000_000, 0);
        assert_eq!(
            seed_genesis(&a, &identity(), "refs/tags/genesis", date).await.unwrap(),
            seed_genesis(&b, &identity(), "refs/tags/genesis", date).await.unwrap()
        );
    }

    #[tokio::test]
    async fn git_origin_has_tagged_genesis() {
        let dir = tempfile::tempdir().unwrap();
        if !GitCli::new(dir.path()).available().await {
            return;
        }
        let genesis = init_git_origin(dir.path(), &identity(), "refs/tags/genesis")
            .await
            .unwrap();
        let store = GitObjectStore::new(dir.path());
        let block = store.read_block(&genesis).await.unwrap().unwrap();
        assert!(block.is_root());
        assert_eq!(block.tree.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }
}
