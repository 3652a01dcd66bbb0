use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tally_refs::{FsRefStore, InMemoryRefStore, RefStore};
use tally_store::{reachable, FsObjectDatabase, InMemoryObjectDatabase, ObjectDatabase, StoreError};
use tally_types::ObjectId;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Transport interface for a native origin.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Where the origin's ref currently points.
    async fn read_ref(&self, name: &str) -> SyncResult<Option<ObjectId>>;

    /// Copy into `local` every object reachable from `tip` that it lacks.
    /// Returns the number of objects copied.
    async fn fetch_objects(&self, tip: ObjectId, local: &dyn ObjectDatabase) -> SyncResult<usize>;

    /// Copy from `local` to the origin every object reachable from `tip`
    /// that the origin lacks.
    async fn push_objects(&self, tip: ObjectId, local: &dyn ObjectDatabase) -> SyncResult<usize>;

    /// Compare-and-swap the origin's ref. `Ok(false)` when it no longer
    /// points at `expected`.
    async fn update_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> SyncResult<bool>;
}

/// Copy every object reachable from `tip` in `src` that `dst` does not hold.
///
/// An object already in `dst` is assumed to come with everything it links
/// to, so the walk stops there.
pub fn copy_missing(
    src: &dyn ObjectDatabase,
    dst: &dyn ObjectDatabase,
    tip: ObjectId,
) -> SyncResult<usize> {
    let missing = reachable(src, &[tip], |id| dst.exists(id))?;
    for id in &missing {
        let object = src.read(id)?.ok_or(StoreError::NotFound(*id))?;
        let written = dst.write(&object)?;
        if written != *id {
            return Err(SyncError::Inconsistent(format!(
                "object {id} rehashed to {written} during transfer"
            )));
        }
    }
    Ok(missing.len())
}

/// An origin reachable in-process: a bare origin directory, or shared
/// in-memory stores.
///
/// Clones share the same underlying stores, which is how several mirrors
/// attach to one in-memory origin.
#[derive(Clone)]
pub struct LocalTransport {
    odb: Arc<dyn ObjectDatabase>,
    refs: Arc<dyn RefStore>,
}

impl LocalTransport {
    pub fn new(odb: Arc<dyn ObjectDatabase>, refs: Arc<dyn RefStore>) -> Self {
        Self { odb, refs }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryObjectDatabase::new()),
            Arc::new(InMemoryRefStore::new()),
        )
    }

    /// Open a bare origin: `<dir>/objects` and `<dir>/refs`.
    pub fn open(dir: &Path) -> SyncResult<Self> {
        let odb = FsObjectDatabase::open(dir.join("objects"))?;
        let refs = FsRefStore::open(dir)?;
        Ok(Self::new(Arc::new(odb), Arc::new(refs)))
    }

    pub fn odb(&self) -> &Arc<dyn ObjectDatabase> {
        &self.odb
    }

    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }
}

#[async_trait]
impl RemoteTransport for LocalTransport {
    async fn read_ref(&self, name: &str) -> SyncResult<Option<ObjectId>> {
        Ok(self.refs.resolve(name)?)
    }

    async fn fetch_objects(&self, tip: ObjectId, local: &dyn ObjectDatabase) -> SyncResult<usize> {
        let copied = copy_missing(self.odb.as_ref(), local, tip)?;
        debug!(%tip, copied, "fetched objects");
        Ok(copied)
    }

    async fn push_objects(&self, tip: ObjectId, local: &dyn ObjectDatabase) -> SyncResult<usize> {
        let copied = copy_missing(local, self.odb.as_ref(), tip)?;
        debug!(%tip, copied, "pushed objects");
        Ok(copied)
    }

    async fn update_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> SyncResult<bool> {
        Ok(self.refs.compare_and_swap(name, expected, new)?)
    }
}
