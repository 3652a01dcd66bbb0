use std::sync::Arc;

use tally_crypto::DifficultyTarget;
use tally_repo::{Block, BlockDraft, ObjectStore};
use tally_sync::RemoteSync;
use tally_types::ObjectId;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::error::{MinerError, MinerResult};
use crate::miner::{MinerStatus, MiningSettings};
use crate::queue::MiningQueue;
use crate::request::{PendingBlockRequest, StaleAction};
use crate::state::SharedState;
use crate::window::{author_date, parent_window, stamped_message};

enum Outcome {
    Accepted(Block),
    Stale,
}

/// The single task that mines. It owns the queue and is the only writer of
/// the branch ref and of `last_block`.
pub(crate) struct MiningWorker {
    pub store: Arc<dyn ObjectStore>,
    pub sync: Arc<dyn RemoteSync>,
    pub settings: MiningSettings,
    pub target: DifficultyTarget,
    pub branch_ref: String,
    pub state: SharedState,
    pub inbox: mpsc::UnboundedReceiver<PendingBlockRequest>,
    pub status: watch::Sender<MinerStatus>,
    pub gc_gate: Arc<RwLock<()>>,
    pub queue: MiningQueue,
    /// Blocks were written since the last collection.
    pub dirty: bool,
}

impl MiningWorker {
    pub async fn run(mut self) {
        loop {
            self.pull_pending();
            let Some(request) = self.queue.pop_front() else {
                self.collect_garbage().await;
                if self.queue.is_empty() {
                    self.set_status(MinerStatus::Idle);
                    match self.inbox.recv().await {
                        Some(request) => self.queue.push_back(request),
                        None => break,
                    }
                }
                continue;
            };
            self.set_status(MinerStatus::Mining);
            self.process(request).await;
        }
        debug!("mining worker stopped");
    }

    fn pull_pending(&mut self) {
        while let Ok(request) = self.inbox.try_recv() {
            self.queue.push_back(request);
        }
    }

    fn set_status(&self, status: MinerStatus) {
        self.status.send_replace(status);
    }

    /// Advisory cleanup once the queue has emptied. Skipped while any
    /// snapshot is waiting to be enqueued or mined.
    async fn collect_garbage(&mut self) {
        if !self.dirty {
            return;
        }
        let Ok(_exclusive) = Arc::clone(&self.gc_gate).try_write_owned() else {
            debug!("snapshot outstanding; deferring garbage collection");
            return;
        };
        self.pull_pending();
        if !self.queue.is_empty() {
            return;
        }
        match self.store.garbage_collect().await {
            Ok(removed) => debug!(removed, "garbage collected"),
            Err(e) => warn!(error = %e, "garbage collection failed"),
        }
        self.dirty = false;
    }

    async fn process(&mut self, mut request: PendingBlockRequest) {
        self.dirty = true;
        match self.mine(&mut request).await {
            Ok(Outcome::Accepted(block)) => {
                info!(
                    request = %request.id,
                    block = %block.hash,
                    attempts = request.attempts,
                    elapsed_ms = request.started.elapsed().as_millis() as u64,
                    "block accepted"
                );
                request.resolve(Ok(true));
            }
            Ok(Outcome::Stale) => self.handle_stale(request).await,
            Err(e) => {
                error!(request = %request.id, error = %e, "mining request failed");
                request.resolve(Err(e));
            }
        }
    }

    /// Mine one block on the current tip. Candidates that miss the target
    /// are dropped and retried with a fresh nonce.
    async fn mine(&mut self, request: &mut PendingBlockRequest) -> MinerResult<Outcome> {
        let genesis = self.state.first_block();
        let tip = self.state.last_block();
        let link_level = request.link_level.unwrap_or(self.settings.link_level);
        request.parents =
            parent_window(self.store.as_ref(), &tip, genesis.hash, link_level).await?;
        let date = author_date(request.date_mode, &genesis, &tip);

        let mut attempt = 0u64;
        loop {
            attempt += 1;
            request.attempts += 1;
            let draft = BlockDraft {
                tree: request.tree,
                parents: request.parents.clone(),
                identity: self.settings.identity.clone(),
                date,
                message: stamped_message(
                    request.message.as_deref(),
                    &self.settings.stamp,
                    rand::random(),
                ),
            };
            let hash = self
                .store
                .create_block(&draft)
                .await
                .map_err(|e| MinerError::MiningFailure(e.to_string()))?;

            if !self.target.is_met_by(&hash) {
                trace!(request = %request.id, attempt, %hash, "candidate misses target");
                if self.settings.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(MinerError::MiningFailure(format!(
                        "no candidate matched prefix {} in {attempt} attempts",
                        self.target.prefix()
                    )));
                }
                continue;
            }

            debug!(request = %request.id, attempt, %hash, "candidate meets target");
            if !self
                .store
                .advance_ref(&self.branch_ref, Some(tip.hash), hash)
                .await?
            {
                warn!(request = %request.id, %hash, "local branch moved under the miner");
                return Ok(Outcome::Stale);
            }
            let pushed = self.sync.push(hash).await;
            if !matches!(pushed, Ok(true)) {
                self.restore_branch(hash, tip.hash).await;
            }
            if !pushed? {
                warn!(request = %request.id, %hash, "origin moved ahead; block is stale");
                return Ok(Outcome::Stale);
            }
            let block = draft.into_block(hash);
            self.state.set_last_block(block.clone());
            return Ok(Outcome::Accepted(block));
        }
    }

    /// Put the branch back on `tip` after `candidate` failed to reach the
    /// origin, so the next request's compare-and-swap starts from a tip the
    /// worker still believes in.
    async fn restore_branch(&self, candidate: ObjectId, tip: ObjectId) {
        match self
            .store
            .advance_ref(&self.branch_ref, Some(candidate), tip)
            .await
        {
            Ok(true) => debug!(%candidate, %tip, "branch restored after failed push"),
            Ok(false) => warn!(%candidate, "branch moved during push; not restored"),
            Err(e) => warn!(%candidate, error = %e, "could not restore branch"),
        }
    }

    async fn handle_stale(&mut self, mut request: PendingBlockRequest) {
        if let Err(e) = self.catch_up().await {
            error!(request = %request.id, error = %e, "could not resynchronize after staleness");
            request.resolve(Err(e));
            return;
        }
        match request.stale_action {
            StaleAction::Stop => {
                self.set_status(MinerStatus::Draining);
                request.resolve(Ok(false));
                self.pull_pending();
                let dropped = self.queue.drain_failed();
                warn!(dropped, "stale block under stop policy; queue flushed");
            }
            StaleAction::Retry => {
                info!(request = %request.id, attempts = request.attempts, "stale block; retrying on new tip");
                request.parents.clear();
                self.queue.push_front(request);
            }
            StaleAction::Discard => {
                warn!(request = %request.id, "stale block discarded");
                request.resolve(Ok(false));
            }
        }
    }

    /// Bring the mirror up to the origin and reload `last_block`.
    async fn catch_up(&self) -> MinerResult<Block> {
        let tip = self.sync.synchronize().await?;
        let block = self
            .store
            .read_block(&tip)
            .await?
            .ok_or(MinerError::MissingBlock(tip))?;
        self.state.set_last_block(block.clone());
        debug!(tip = %block.hash, "caught up with origin");
        Ok(block)
    }
}
