//! The [`RefStore`] trait defining the reference storage interface.

use tally_types::ObjectId;

use crate::error::Result;
use crate::types::Ref;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`). Names are canonical
/// (`refs/heads/*`, `refs/tags/*`, `refs/remotes/<remote>/*`).
pub trait RefStore: Send + Sync {
    /// Read a ref by its canonical name.
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<Ref>>;

    /// Create or overwrite a ref at its canonical name.
    ///
    /// Fails with `TagImmutable` when a tag would be moved to a different
    /// target. Rewriting a tag with its current target is a no-op.
    fn write_ref(&self, reference: &Ref) -> Result<()>;

    /// Delete a ref. Returns `Ok(true)` if the ref existed.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<Ref>>;

    /// Atomically move `name` to `new` if it currently points at `expected`
    /// (`None` meaning "does not exist"). Returns `Ok(false)` and leaves the
    /// ref untouched when the current value differs.
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<bool>;

    /// The target of `name`, if it exists.
    fn resolve(&self, name: &str) -> Result<Option<ObjectId>> {
        Ok(self.read_ref(name)?.map(|r| r.target()))
    }
}
