use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tally_crypto::DifficultyTarget;
use tally_repo::{Block, ObjectStore};
use tally_sync::RemoteSync;
use tally_types::ChainIdentity;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::MinerConfig;
use crate::error::{MinerError, MinerResult};
use crate::queue::MiningQueue;
use crate::request::{Completion, PendingBlockRequest, Snapshot, StaleAction};
use crate::state::{ChainState, SharedState};
use crate::worker::MiningWorker;

/// What the mining worker is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MinerStatus {
    Idle,
    Mining,
    /// Flushing the queue after a stale block under the stop policy.
    Draining,
}

/// Chain parameters the worker mines with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningSettings {
    pub identity: ChainIdentity,
    pub difficulty: usize,
    pub link_level: usize,
    pub stamp: String,
    pub max_attempts: Option<u64>,
    /// Policy applied to [`Miner::commit`] requests.
    pub stale_action: StaleAction,
}

impl From<&MinerConfig> for MiningSettings {
    fn from(config: &MinerConfig) -> Self {
        Self {
            identity: config.identity(),
            difficulty: config.difficulty,
            link_level: config.link_level,
            stamp: config.stamp.clone(),
            max_attempts: config.max_attempts,
            stale_action: config.stale_action,
        }
    }
}

/// Everything a miner needs before it knows its chain.
#[derive(Clone)]
pub struct MinerSetup {
    pub store: Arc<dyn ObjectStore>,
    pub sync: Arc<dyn RemoteSync>,
    /// The mirror's working directory.
    pub directory: PathBuf,
    /// Canonical branch ref, e.g. `refs/heads/coins/gold`.
    pub branch_ref: String,
    pub genesis_ref: String,
    pub settings: MiningSettings,
}

/// Handle to a running mining worker.
///
/// Dropping the handle lets the worker finish what is queued and stop.
pub struct Miner {
    store: Arc<dyn ObjectStore>,
    directory: PathBuf,
    settings: MiningSettings,
    target: DifficultyTarget,
    state: SharedState,
    sender: mpsc::UnboundedSender<PendingBlockRequest>,
    status: watch::Receiver<MinerStatus>,
    gc_gate: Arc<RwLock<()>>,
    commit_in_progress: AtomicBool,
    worker: JoinHandle<()>,
}

impl Miner {
    /// Spawn the worker for a chain whose genesis and current tip are known.
    /// Must be called from within a tokio runtime.
    pub fn start(setup: MinerSetup, first_block: Block, last_block: Block) -> MinerResult<Self> {
        let target = DifficultyTarget::new(first_block.hash, setup.settings.difficulty)
            .ok_or_else(|| {
                MinerError::Configuration(format!(
                    "difficulty {} exceeds the {}-character genesis hash",
                    setup.settings.difficulty,
                    first_block.hash.hex_len()
                ))
            })?;
        let state = SharedState::new(ChainState {
            first_block,
            last_block,
            branch_ref: setup.branch_ref.clone(),
        });
        let (sender, inbox) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(MinerStatus::Idle);
        let gc_gate = Arc::new(RwLock::new(()));

        let worker = MiningWorker {
            store: Arc::clone(&setup.store),
            sync: setup.sync,
            settings: setup.settings.clone(),
            target,
            branch_ref: setup.branch_ref,
            state: state.clone(),
            inbox,
            status: status_tx,
            gc_gate: Arc::clone(&gc_gate),
            queue: MiningQueue::new(),
            dirty: false,
        };
        let worker = tokio::spawn(worker.run());
        info!(prefix = %target.prefix(), directory = %setup.directory.display(), "miner started");

        Ok(Self {
            store: setup.store,
            directory: setup.directory,
            settings: setup.settings,
            target,
            state,
            sender,
            status,
            gc_gate,
            commit_in_progress: AtomicBool::new(false),
            worker,
        })
    }

    /// Record the working directory as a block labelled `label`.
    ///
    /// Resolves `true` once the block is on the origin and `false` if it went
    /// stale and was dropped. A second call while one is outstanding fails
    /// with `CommitInProgress`.
    pub async fn commit(&self, label: &str) -> MinerResult<bool> {
        let _guard = CommitGuard::acquire(&self.commit_in_progress)?;
        let snapshot = self.snapshot().await?;
        let request = PendingBlockRequest::from_snapshot(snapshot)
            .with_message(label)
            .with_stale_action(self.settings.stale_action);
        self.enqueue(request)?.wait().await
    }

    /// Snapshot the working directory into a tree.
    pub async fn snapshot(&self) -> MinerResult<Snapshot> {
        let gc_hold = Arc::clone(&self.gc_gate).read_owned().await;
        let tree = self.store.compute_tree_hash(&self.directory).await?;
        Ok(Snapshot { tree, gc_hold })
    }

    /// Queue a request without the single-commit guard.
    pub fn enqueue(&self, mut request: PendingBlockRequest) -> MinerResult<Completion> {
        let completion = request.attach();
        self.sender.send(request).map_err(|_| MinerError::Shutdown)?;
        Ok(completion)
    }

    pub fn first_block(&self) -> Block {
        self.state.first_block()
    }

    pub fn last_block(&self) -> Block {
        self.state.last_block()
    }

    pub fn chain_state(&self) -> ChainState {
        self.state.get()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn branch_ref(&self) -> String {
        self.state.get().branch_ref
    }

    pub fn target(&self) -> DifficultyTarget {
        self.target
    }

    pub fn settings(&self) -> &MiningSettings {
        &self.settings
    }

    pub fn status(&self) -> MinerStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MinerStatus> {
        self.status.clone()
    }

    /// Stop accepting work, let the worker finish its queue, and wait for it.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.worker.await;
    }
}

/// Holds the single outstanding-commit flag for the life of a commit.
struct CommitGuard<'a>(&'a AtomicBool);

impl<'a> CommitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> MinerResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MinerError::CommitInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
