use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tally_refs::{FsRefStore, InMemoryRefStore, RefStore};
use tally_store::{
    reachable, write_tree, BlockObject, FsObjectDatabase, InMemoryObjectDatabase, ObjectDatabase,
    ObjectKind, METADATA_DIR,
};
use tally_types::ObjectId;
use tracing::{debug, info};

use crate::block::{Block, BlockDraft};
use crate::error::{RepoError, RepoResult};
use crate::traits::ObjectStore;

/// [`ObjectStore`] over a Tally object database and ref store.
///
/// A mirror on disk keeps both under `<mirror>/.tally/`: loose objects in
/// `objects/` and refs in `refs/`.
#[derive(Clone)]
pub struct NativeObjectStore {
    odb: Arc<dyn ObjectDatabase>,
    refs: Arc<dyn RefStore>,
}

impl NativeObjectStore {
    pub fn new(odb: Arc<dyn ObjectDatabase>, refs: Arc<dyn RefStore>) -> Self {
        Self { odb, refs }
    }

    /// Purely in-memory store.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryObjectDatabase::new()),
            Arc::new(InMemoryRefStore::new()),
        )
    }

    /// Open (creating if needed) the metadata of the mirror at `mirror_dir`.
    pub fn open(mirror_dir: &Path) -> RepoResult<Self> {
        let meta = Self::metadata_dir(mirror_dir);
        let odb = FsObjectDatabase::open(meta.join("objects"))?;
        let refs = FsRefStore::open(&meta)?;
        Ok(Self::new(Arc::new(odb), Arc::new(refs)))
    }

    pub fn metadata_dir(mirror_dir: &Path) -> PathBuf {
        mirror_dir.join(METADATA_DIR)
    }

    pub fn odb(&self) -> &Arc<dyn ObjectDatabase> {
        &self.odb
    }

    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }
}

fn require(odb: &dyn ObjectDatabase, id: &ObjectId, what: &str) -> RepoResult<()> {
    if !odb.exists(id)? {
        return Err(RepoError::ObjectWrite(format!("{what} {id} does not exist")));
    }
    Ok(())
}

async fn blocking<T, F>(f: F) -> RepoResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RepoResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RepoError::Task(e.to_string()))?
}

#[async_trait]
impl ObjectStore for NativeObjectStore {
    async fn compute_tree_hash(&self, directory: &Path) -> RepoResult<ObjectId> {
        let odb = Arc::clone(&self.odb);
        let directory = directory.to_path_buf();
        blocking(move || Ok(write_tree(odb.as_ref(), &directory)?)).await
    }

    async fn create_block(&self, draft: &BlockDraft) -> RepoResult<ObjectId> {
        let odb = Arc::clone(&self.odb);
        let tree = draft.tree;
        let parents = draft.parents.clone();
        let stored = draft.to_object().to_stored_object();
        let hash = blocking(move || {
            require(odb.as_ref(), &tree, "tree")?;
            for parent in &parents {
                require(odb.as_ref(), parent, "parent")?;
            }
            odb.write(&stored)
                .map_err(|e| RepoError::ObjectWrite(e.to_string()))
        })
        .await?;
        debug!(block = %hash, parents = draft.parents.len(), "block written");
        Ok(hash)
    }

    async fn read_block(&self, hash: &ObjectId) -> RepoResult<Option<Block>> {
        let odb = Arc::clone(&self.odb);
        let hash = *hash;
        blocking(move || {
            let Some(stored) = odb.read(&hash)? else {
                return Ok(None);
            };
            if stored.kind != ObjectKind::Block {
                return Err(RepoError::NotABlock(hash));
            }
            let object = BlockObject::from_stored_object(&stored)?;
            Ok(Some(Block::from_object(hash, object)))
        })
        .await
    }

    async fn resolve_ref(&self, name: &str) -> RepoResult<Option<ObjectId>> {
        Ok(self.refs.resolve(name)?)
    }

    async fn advance_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        to: ObjectId,
    ) -> RepoResult<bool> {
        Ok(self.refs.compare_and_swap(name, expected, to)?)
    }

    async fn garbage_collect(&self) -> RepoResult<usize> {
        let odb = Arc::clone(&self.odb);
        let refs = Arc::clone(&self.refs);
        let removed = blocking(move || {
            let roots: Vec<ObjectId> = refs.list_refs("")?.iter().map(|r| r.target()).collect();
            let live = reachable(odb.as_ref(), &roots, |_| Ok(false))?;
            let mut removed = 0;
            for id in odb.list_ids()? {
                if !live.contains(&id) && odb.delete(&id)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await?;
        if removed > 0 {
            info!(removed, "garbage collected unreachable objects");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_refs::Ref;
    use tally_store::{Blob, Tree};
    use tally_types::{BlockTime, ChainIdentity, Person};

    fn identity() -> ChainIdentity {
        ChainIdentity::single(Person::new("Tally Miner", "miner@tally.local"))
    }

    async fn empty_tree(store: &NativeObjectStore) -> ObjectId {
        store
            .odb()
            .write(&Tree::empty().to_stored_object().unwrap())
            .unwrap()
    }

    fn draft(tree: ObjectId, parents: Vec<ObjectId>, message: &str) -> BlockDraft {
        BlockDraft {
            tree,
            parents,
            identity: identity(),
            date: BlockTime::new(1_700_000_000, 0),
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn identical_drafts_hash_identically() {
        let store = NativeObjectStore::in_memory();
        let tree = empty_tree(&store).await;
        let a = store.create_block(&draft(tree, vec![], "same")).await.unwrap();
        let b = store.create_block(&draft(tree, vec![], "same")).await.unwrap();
        assert_eq!(a, b);
        let c = store.create_block(&draft(tree, vec![], "other")).await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn read_back_preserves_metadata() {
        let store = NativeObjectStore::in_memory();
        let tree = empty_tree(&store).await;
        let genesis = store.create_block(&draft(tree, vec![], "genesis")).await.unwrap();
        let d = draft(tree, vec![genesis], "label\n\nTALLY 00");
        let hash = store.create_block(&d).await.unwrap();

        let block = store.read_block(&hash).await.unwrap().unwrap();
        assert_eq!(block, d.into_block(hash));
        assert!(store
            .read_block(&ObjectId::from_bytes(b"missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn non_block_is_rejected_on_read() {
        let store = NativeObjectStore::in_memory();
        let tree = empty_tree(&store).await;
        assert!(matches!(
            store.read_block(&tree).await,
            Err(RepoError::NotABlock(_))
        ));
    }

    #[tokio::test]
    async fn missing_parent_is_a_write_error() {
        let store = NativeObjectStore::in_memory();
        let tree = empty_tree(&store).await;
        let err = store
            .create_block(&draft(tree, vec![ObjectId::from_bytes(b"ghost")], "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ObjectWrite(_)));
    }

    #[tokio::test]
    async fn advance_ref_fails_closed() {
        let store = NativeObjectStore::in_memory();
        let tree = empty_tree(&store).await;
        let a = store.create_block(&draft(tree, vec![], "a")).await.unwrap();
        let b = store.create_block(&draft(tree, vec![a], "b")).await.unwrap();
        let name = "refs/heads/coins/gold";

        assert!(store.advance_ref(name, None, a).await.unwrap());
        assert!(!store.advance_ref(name, None, b).await.unwrap());
        assert!(store.advance_ref(name, Some(a), b).await.unwrap());
        assert_eq!(store.resolve_ref(name).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn gc_keeps_reachable_objects() {
        let store = NativeObjectStore::in_memory();
        let tree = empty_tree(&store).await;
        let genesis = store.create_block(&draft(tree, vec![], "g")).await.unwrap();
        store
            .refs()
            .write_ref(&Ref::tag("genesis", genesis))
            .unwrap();
        let orphan_blob = store
            .odb()
            .write(&Blob::new(b"loose".to_vec()).to_stored_object())
            .unwrap();
        let orphan_block = store.create_block(&draft(tree, vec![genesis], "lost")).await.unwrap();

        assert_eq!(store.garbage_collect().await.unwrap(), 2);
        assert!(!store.odb().exists(&orphan_blob).unwrap());
        assert!(!store.odb().exists(&orphan_block).unwrap());
        assert!(store.read_block(&genesis).await.unwrap().is_some());
        assert_eq!(store.garbage_collect().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn on_disk_mirror_snapshots_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ledger.txt"), "alice 10\n").unwrap();

        let store = NativeObjectStore::open(dir.path()).unwrap();
        let tree = store.compute_tree_hash(dir.path()).await.unwrap();
        let hash = store.create_block(&draft(tree, vec![], "g")).await.unwrap();
        assert!(store
            .advance_ref("refs/tags/genesis", None, hash)
            .await
            .unwrap());

        // Metadata is not part of the snapshot.
        assert_eq!(store.compute_tree_hash(dir.path()).await.unwrap(), tree);

        let reopened = NativeObjectStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.resolve_ref("refs/tags/genesis").await.unwrap(),
            Some(hash)
        );
        assert_eq!(reopened.read_block(&hash).await.unwrap().unwrap().tree, tree);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_block_io_on_disk_agrees() {
        let dir = tempfile::tempdir().unwrap();
        let store = NativeObjectStore::open(dir.path()).unwrap();
        let tree = store.compute_tree_hash(dir.path()).await.unwrap();
        let shared = draft(tree, vec![], "shared");

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let shared = shared.clone();
                tokio::spawn(async move {
                    let hash = store.create_block(&shared).await.unwrap();
                    store.read_block(&hash).await.unwrap().unwrap()
                })
            })
            .collect();
        let mut blocks = Vec::new();
        for task in tasks {
            blocks.push(task.await.unwrap());
        }
        assert!(blocks.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(blocks[0].message, "shared");
        assert_eq!(store.odb().list_ids().unwrap().len(), 2);
    }
}
