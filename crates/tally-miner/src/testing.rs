//! Scripted collaborators for exercising the queue policies.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tally_repo::{Block, BlockDraft, ObjectStore, RepoResult};
use tally_sync::{RemoteSync, SyncError, SyncResult};
use tally_types::{BlockTime, ChainIdentity, ObjectId, Person};
use tokio::sync::{Notify, Semaphore};

use crate::miner::{Miner, MinerSetup, MiningSettings};
use crate::request::StaleAction;

pub(crate) const GENESIS_REF: &str = "refs/tags/genesis";
pub(crate) const BRANCH_REF: &str = "refs/heads/coins/test";

pub(crate) fn identity() -> ChainIdentity {
    ChainIdentity::single(Person::new("Tally Miner", "miner@tally.local"))
}

/// In-memory store whose block hashes all share the genesis prefix `abcd`,
/// unless a hash has been scripted for the next write.
pub(crate) struct ScriptedStore {
    blocks: Mutex<HashMap<ObjectId, Block>>,
    refs: Mutex<HashMap<String, ObjectId>>,
    drafts: Mutex<Vec<BlockDraft>>,
    scripted: Mutex<VecDeque<ObjectId>>,
    gc_calls: AtomicUsize,
}

impl ScriptedStore {
    /// A store holding only genesis (`abcd1234…`), tagged and on the branch.
    pub fn with_genesis() -> (Self, Block) {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&[0xab, 0xcd, 0x12, 0x34]);
        let genesis = BlockDraft {
            tree: ObjectId::from_bytes(b"empty tree"),
            parents: Vec::new(),
            identity: identity(),
            date: BlockTime::new(1_700_000_000, 0),
            message: "genesis\n".into(),
        }
        .into_block(ObjectId::from_hash(bytes));
        let store = Self {
            blocks: Mutex::new(HashMap::from([(genesis.hash, genesis.clone())])),
            refs: Mutex::new(HashMap::from([
                (GENESIS_REF.to_string(), genesis.hash),
                (BRANCH_REF.to_string(), genesis.hash),
            ])),
            drafts: Mutex::default(),
            scripted: Mutex::default(),
            gc_calls: AtomicUsize::new(0),
        };
        (store, genesis)
    }

    /// Hashes handed out, in order, by the next block writes.
    pub fn script_hashes(&self, hashes: impl IntoIterator<Item = ObjectId>) {
        self.scripted.lock().unwrap().extend(hashes);
    }

    pub fn drafts(&self) -> Vec<BlockDraft> {
        self.drafts.lock().unwrap().clone()
    }

    pub fn block(&self, hash: &ObjectId) -> Option<Block> {
        self.blocks.lock().unwrap().get(hash).cloned()
    }

    pub fn insert(&self, block: Block) {
        self.blocks.lock().unwrap().insert(block.hash, block);
    }

    pub fn set_ref(&self, name: &str, target: ObjectId) {
        self.refs.lock().unwrap().insert(name.to_string(), target);
    }

    pub fn gc_calls(&self) -> usize {
        self.gc_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn compute_tree_hash(&self, directory: &Path) -> RepoResult<ObjectId> {
        Ok(ObjectId::from_bytes(directory.to_string_lossy().as_bytes()))
    }

    async fn create_block(&self, draft: &BlockDraft) -> RepoResult<ObjectId> {
        self.drafts.lock().unwrap().push(draft.clone());
        let scripted = self.scripted.lock().unwrap().pop_front();
        let hash = scripted.unwrap_or_else(|| {
            let natural = ObjectId::from_bytes(draft.to_object().encode().as_bytes());
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(natural.as_bytes());
            bytes[..2].copy_from_slice(&[0xab, 0xcd]);
            ObjectId::from_hash(bytes)
        });
        self.insert(draft.clone().into_block(hash));
        Ok(hash)
    }

    async fn read_block(&self, hash: &ObjectId) -> RepoResult<Option<Block>> {
        Ok(self.block(hash))
    }

    async fn resolve_ref(&self, name: &str) -> RepoResult<Option<ObjectId>> {
        Ok(self.refs.lock().unwrap().get(name).copied())
    }

    async fn advance_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        to: ObjectId,
    ) -> RepoResult<bool> {
        let mut refs = self.refs.lock().unwrap();
        if refs.get(name).copied() != expected {
            return Ok(false);
        }
        refs.insert(name.to_string(), to);
        Ok(true)
    }

    async fn garbage_collect(&self) -> RepoResult<usize> {
        self.gc_calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

/// Origin stand-in. Pushes succeed unless scripted otherwise; a successful
/// push moves the remote tip, and `synchronize` resets the store's branch to
/// it.
pub(crate) struct ScriptedSync {
    store: Arc<ScriptedStore>,
    remote_tip: Mutex<ObjectId>,
    push_script: Mutex<VecDeque<bool>>,
    pushes: Mutex<Vec<ObjectId>>,
    sync_calls: AtomicUsize,
    fail_next_sync: AtomicBool,
    fail_next_push: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    push_started: Notify,
}

impl ScriptedSync {
    pub fn new(store: Arc<ScriptedStore>, remote_tip: ObjectId) -> Self {
        Self {
            store,
            remote_tip: Mutex::new(remote_tip),
            push_script: Mutex::default(),
            pushes: Mutex::default(),
            sync_calls: AtomicUsize::new(0),
            fail_next_sync: AtomicBool::new(false),
            fail_next_push: AtomicBool::new(false),
            gate: Mutex::new(None),
            push_started: Notify::new(),
        }
    }

    /// Outcomes for the next pushes; `true` once the script runs out.
    pub fn script_pushes(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.push_script.lock().unwrap().extend(outcomes);
    }

    /// Make pushes block until [`release_pushes`](Self::release_pushes).
    pub fn hold_pushes(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_pushes(&self) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(1);
        }
    }

    /// Resolves once a push has begun.
    pub async fn push_started(&self) {
        self.push_started.notified().await;
    }

    pub fn fail_next_synchronize(&self) {
        self.fail_next_sync.store(true, Ordering::SeqCst);
    }

    /// The next push errors out without reaching the origin.
    pub fn fail_next_push(&self) {
        self.fail_next_push.store(true, Ordering::SeqCst);
    }

    /// Move the origin's tip as if another miner had pushed `tip`.
    pub fn advance_remote(&self, tip: ObjectId) {
        *self.remote_tip.lock().unwrap() = tip;
    }

    pub fn pushes(&self) -> Vec<ObjectId> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSync for ScriptedSync {
    async fn attach(&self) -> SyncResult<ObjectId> {
        let tip = *self.remote_tip.lock().unwrap();
        self.store.set_ref(BRANCH_REF, tip);
        Ok(tip)
    }

    async fn synchronize(&self) -> SyncResult<ObjectId> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_sync.swap(false, Ordering::SeqCst) {
            return Err(SyncError::RemoteError("origin unreachable".into()));
        }
        let tip = *self.remote_tip.lock().unwrap();
        self.store.set_ref(BRANCH_REF, tip);
        Ok(tip)
    }

    async fn push(&self, local_head: ObjectId) -> SyncResult<bool> {
        self.pushes.lock().unwrap().push(local_head);
        self.push_started.notify_one();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        }
        if self.fail_next_push.swap(false, Ordering::SeqCst) {
            return Err(SyncError::RemoteError("connection reset".into()));
        }
        let accepted = self.push_script.lock().unwrap().pop_front().unwrap_or(true);
        if accepted {
            *self.remote_tip.lock().unwrap() = local_head;
        }
        Ok(accepted)
    }
}

/// A setup over scripted collaborators, with genesis as the current tip.
pub(crate) fn scripted_setup(
    difficulty: usize,
    link_level: usize,
) -> (MinerSetup, Block, Arc<ScriptedStore>, Arc<ScriptedSync>) {
    let (store, genesis) = ScriptedStore::with_genesis();
    let store = Arc::new(store);
    let sync = Arc::new(ScriptedSync::new(Arc::clone(&store), genesis.hash));
    let setup = MinerSetup {
        store: store.clone(),
        sync: sync.clone(),
        directory: PathBuf::from("/mirror"),
        branch_ref: BRANCH_REF.into(),
        genesis_ref: GENESIS_REF.into(),
        settings: MiningSettings {
            identity: identity(),
            difficulty,
            link_level,
            stamp: "TALLY".into(),
            max_attempts: None,
            stale_action: StaleAction::Discard,
        },
    };
    (setup, genesis, store, sync)
}

/// A running miner on a fresh scripted chain. `configure` runs before the
/// worker starts.
pub(crate) fn scripted_miner(
    difficulty: usize,
    link_level: usize,
    configure: impl FnOnce(&ScriptedSync),
) -> (Miner, Arc<ScriptedStore>, Arc<ScriptedSync>) {
    let (setup, genesis, store, sync) = scripted_setup(difficulty, link_level);
    configure(&sync);
    let miner = Miner::start(setup, genesis.clone(), genesis).unwrap();
    (miner, store, sync)
}
