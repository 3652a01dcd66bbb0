use tally_types::ObjectId;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Content-addressed object database.
///
/// Writing is idempotent: the id is the hash of the object, so writing the
/// same object twice stores it once. Nothing outside garbage collection
/// deletes.
pub trait ObjectDatabase: Send + Sync {
    /// `Ok(None)` when absent; `Err` on I/O failure or corruption.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Returns `true` if the object existed. Removing an object that is
    /// still reachable corrupts the chain.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Every stored id, sorted.
    fn list_ids(&self) -> StoreResult<Vec<ObjectId>>;
}
