use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tally_types::ObjectId;
use tokio::sync::{oneshot, OwnedRwLockReadGuard};
use uuid::Uuid;

use crate::error::{MinerError, MinerResult};

/// How a block's authored date is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateMode {
    /// Wall-clock time when mining starts.
    #[default]
    CurrentDate,
    /// The genesis block's date.
    FirstBlock,
    /// The current tip's date.
    LastBlock,
    /// The current tip's date plus one second.
    LastBlockIncrement,
}

/// What happens to a request whose push lost to a newer origin tip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleAction {
    /// Resolve `false` and carry on with the queue.
    #[default]
    Discard,
    /// Put the request back at the head of the queue and mine it again on
    /// top of the new tip.
    Retry,
    /// Resolve `false` along with every other queued request.
    Stop,
}

impl fmt::Display for StaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discard => "discard",
            Self::Retry => "retry",
            Self::Stop => "stop",
        })
    }
}

impl FromStr for StaleAction {
    type Err = MinerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discard" => Ok(Self::Discard),
            "retry" => Ok(Self::Retry),
            "stop" => Ok(Self::Stop),
            other => Err(MinerError::Configuration(format!(
                "unknown stale action {other:?}"
            ))),
        }
    }
}

/// A working-tree snapshot waiting to be mined.
///
/// While a snapshot (or a request built from it) is alive the worker will not
/// garbage-collect, so the tree it names cannot be pruned before its block
/// references it.
pub struct Snapshot {
    pub(crate) tree: ObjectId,
    pub(crate) gc_hold: OwnedRwLockReadGuard<()>,
}

impl Snapshot {
    pub fn tree(&self) -> ObjectId {
        self.tree
    }
}

/// One block the miner has been asked to produce.
///
/// Parents and date are computed when the request reaches the head of the
/// queue, and again on every retry. The request is resolved exactly once:
/// [`resolve`](Self::resolve) consumes it.
pub struct PendingBlockRequest {
    pub(crate) id: Uuid,
    pub(crate) tree: ObjectId,
    pub(crate) message: Option<String>,
    pub(crate) link_level: Option<usize>,
    pub(crate) date_mode: DateMode,
    pub(crate) stale_action: StaleAction,
    pub(crate) parents: Vec<ObjectId>,
    pub(crate) started: Instant,
    pub(crate) attempts: u64,
    reply: Option<oneshot::Sender<MinerResult<bool>>>,
    _gc_hold: Option<OwnedRwLockReadGuard<()>>,
}

impl PendingBlockRequest {
    pub fn new(tree: ObjectId) -> Self {
        Self {
            id: Uuid::now_v7(),
            tree,
            message: None,
            link_level: None,
            date_mode: DateMode::default(),
            stale_action: StaleAction::default(),
            parents: Vec::new(),
            started: Instant::now(),
            attempts: 0,
            reply: None,
            _gc_hold: None,
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut request = Self::new(snapshot.tree);
        request._gc_hold = Some(snapshot.gc_hold);
        request
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Override the miner's configured link level for this block.
    pub fn with_link_level(mut self, link_level: usize) -> Self {
        self.link_level = Some(link_level);
        self
    }

    pub fn with_date_mode(mut self, date_mode: DateMode) -> Self {
        self.date_mode = date_mode;
        self
    }

    pub fn with_stale_action(mut self, stale_action: StaleAction) -> Self {
        self.stale_action = stale_action;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tree(&self) -> ObjectId {
        self.tree
    }

    pub fn stale_action(&self) -> StaleAction {
        self.stale_action
    }

    /// Parents chosen for the latest attempt; empty until first mined.
    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// Candidate blocks written for this request so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub(crate) fn attach(&mut self) -> Completion {
        let (tx, rx) = oneshot::channel();
        self.reply = Some(tx);
        Completion(rx)
    }

    /// Deliver the outcome to whoever is waiting. A caller that stopped
    /// waiting is not an error.
    pub(crate) fn resolve(mut self, outcome: MinerResult<bool>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(outcome);
        }
    }
}

impl fmt::Debug for PendingBlockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingBlockRequest")
            .field("id", &self.id)
            .field("tree", &self.tree)
            .field("date_mode", &self.date_mode)
            .field("stale_action", &self.stale_action)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

/// Handle on a queued request's outcome.
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<MinerResult<bool>>);

impl Completion {
    /// `Ok(true)` once the block is on the origin, `Ok(false)` when the
    /// request was dropped after going stale.
    pub async fn wait(self) -> MinerResult<bool> {
        self.0.await.map_err(|_| MinerError::Shutdown)?
    }
}
