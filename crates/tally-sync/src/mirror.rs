use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tally_refs::Ref;
use tally_repo::{NativeObjectStore, ObjectStore};
use tally_store::{checkout, BlockObject, ObjectDatabase, ObjectKind};
use tally_types::ObjectId;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::traits::RemoteSync;
use crate::transport::RemoteTransport;

const REMOTE_NAME: &str = "origin";

/// Whether `ancestor` is `descendant` or reachable from it through parent
/// links in `db`. Blocks `db` does not hold are treated as unrelated.
pub fn is_ancestor(
    db: &dyn ObjectDatabase,
    ancestor: ObjectId,
    descendant: ObjectId,
) -> SyncResult<bool> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([descendant]);
    while let Some(id) = queue.pop_front() {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            continue;
        }
        let Some(object) = db.read(&id)? else {
            continue;
        };
        if object.kind != ObjectKind::Block {
            continue;
        }
        queue.extend(BlockObject::from_stored_object(&object)?.parents);
    }
    Ok(false)
}

/// [`RemoteSync`] for a native mirror: a working directory whose objects and
/// refs live in a [`NativeObjectStore`], kept in step with an origin reached
/// through a [`RemoteTransport`].
pub struct MirrorSync {
    transport: Arc<dyn RemoteTransport>,
    local: NativeObjectStore,
    workdir: PathBuf,
    branch: String,
    genesis_ref: String,
}

impl MirrorSync {
    /// `branch` is the short branch name (e.g. `coins/gold`); `genesis_ref`
    /// is canonical (e.g. `refs/tags/genesis`).
    pub fn new(
        transport: Arc<dyn RemoteTransport>,
        local: NativeObjectStore,
        workdir: impl Into<PathBuf>,
        branch: impl Into<String>,
        genesis_ref: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            local,
            workdir: workdir.into(),
            branch: branch.into(),
            genesis_ref: genesis_ref.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn branch_ref(&self) -> String {
        Ref::branch(self.branch.clone(), ObjectId::null()).canonical_name()
    }

    fn tracking_ref(&self, target: ObjectId) -> Ref {
        Ref::Remote {
            remote: REMOTE_NAME.to_string(),
            branch: self.branch.clone(),
            target,
        }
    }

    fn local_tip(&self) -> SyncResult<Option<ObjectId>> {
        Ok(self.local.refs().resolve(&self.branch_ref())?)
    }

    fn block_tree(&self, block: ObjectId) -> SyncResult<ObjectId> {
        let stored = self
            .local
            .odb()
            .read(&block)?
            .ok_or_else(|| SyncError::Inconsistent(format!("block {block} not in mirror")))?;
        Ok(BlockObject::from_stored_object(&stored)?.tree)
    }

    /// Whether the working tree still matches `block`'s snapshot.
    async fn is_clean(&self, block: ObjectId) -> SyncResult<bool> {
        let expected = self.block_tree(block)?;
        let actual = self.local.compute_tree_hash(&self.workdir).await?;
        Ok(actual == expected)
    }

    async fn checkout_block(&self, block: ObjectId) -> SyncResult<()> {
        let tree = self.block_tree(block)?;
        let odb = Arc::clone(self.local.odb());
        let workdir = self.workdir.clone();
        let summary = tokio::task::spawn_blocking(move || checkout(odb.as_ref(), &tree, &workdir))
            .await
            .map_err(|e| SyncError::Inconsistent(e.to_string()))??;
        debug!(%block, written = summary.written, removed = summary.removed, "working tree reset");
        Ok(())
    }

    /// Fetch the origin's branch, if it has one, and record the tracking ref.
    async fn fetch(&self) -> SyncResult<Option<ObjectId>> {
        let Some(remote_tip) = self.transport.read_ref(&self.branch_ref()).await? else {
            return Ok(None);
        };
        self.transport
            .fetch_objects(remote_tip, self.local.odb().as_ref())
            .await?;
        self.local.refs().write_ref(&self.tracking_ref(remote_tip))?;
        Ok(Some(remote_tip))
    }

    /// Point the local branch at `tip` and make the working tree match it.
    async fn reset_to(&self, tip: ObjectId) -> SyncResult<()> {
        self.local
            .refs()
            .write_ref(&Ref::branch(self.branch.clone(), tip))?;
        self.checkout_block(tip).await
    }
}

#[async_trait]
impl RemoteSync for MirrorSync {
    async fn attach(&self) -> SyncResult<ObjectId> {
        let genesis = self
            .transport
            .read_ref(&self.genesis_ref)
            .await?
            .ok_or_else(|| SyncError::GenesisMissing(self.genesis_ref.clone()))?;
        self.transport
            .fetch_objects(genesis, self.local.odb().as_ref())
            .await?;
        let genesis_tag = Ref::parse(&self.genesis_ref, genesis)?;
        self.local.refs().write_ref(&genesis_tag)?;

        let tip = self.fetch().await?.unwrap_or(genesis);
        match self.local_tip()? {
            None => self.reset_to(tip).await?,
            Some(local) if local == tip => debug!(%tip, "mirror already on origin tip"),
            Some(local) if self.is_clean(local).await? => self.reset_to(tip).await?,
            Some(local) => {
                // Pending edits stay in the working tree and go into the
                // next block on top of the new tip.
                self.local
                    .refs()
                    .write_ref(&Ref::branch(self.branch.clone(), tip))?;
                warn!(from = %local, to = %tip, "working tree has edits; moved branch only");
            }
        }
        info!(branch = %self.branch, %genesis, %tip, "mirror attached");
        Ok(tip)
    }

    async fn synchronize(&self) -> SyncResult<ObjectId> {
        let local_tip = self.local_tip()?.ok_or_else(|| {
            SyncError::Inconsistent(format!("{} does not exist; attach first", self.branch_ref()))
        })?;
        self.checkout_block(local_tip).await?;

        let tip = match self.fetch().await? {
            Some(remote_tip) => remote_tip,
            None => local_tip,
        };
        if tip != local_tip {
            self.reset_to(tip).await?;
        }
        debug!(branch = %self.branch, %tip, "synchronized");
        Ok(tip)
    }

    async fn push(&self, local_head: ObjectId) -> SyncResult<bool> {
        let name = self.branch_ref();
        let remote_tip = self.transport.read_ref(&name).await?;
        if let Some(remote_tip) = remote_tip {
            if !is_ancestor(self.local.odb().as_ref(), remote_tip, local_head)? {
                debug!(%remote_tip, %local_head, "push is not a fast-forward");
                return Ok(false);
            }
        }
        self.transport
            .push_objects(local_head, self.local.odb().as_ref())
            .await?;
        if !self.transport.update_ref(&name, remote_tip, local_head).await? {
            debug!(%local_head, "origin ref moved during push");
            return Ok(false);
        }
        self.local.refs().write_ref(&self.tracking_ref(local_head))?;
        Ok(true)
    }
}
