use std::collections::HashSet;

use tally_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectDatabase;

/// Every object reachable from `roots` by following block and tree links.
///
/// Objects for which `stop` returns `true` are neither included nor walked
/// through. Fails with [`StoreError::NotFound`] if a link points at an object
/// the database does not hold.
pub fn reachable<D, F>(db: &D, roots: &[ObjectId], mut stop: F) -> StoreResult<HashSet<ObjectId>>
where
    D: ObjectDatabase + ?Sized,
    F: FnMut(&ObjectId) -> StoreResult<bool>,
{
    let mut seen = HashSet::new();
    let mut stopped = HashSet::new();
    let mut stack: Vec<ObjectId> = roots.to_vec();

    while let Some(id) = stack.pop() {
        if seen.contains(&id) || stopped.contains(&id) {
            continue;
        }
        if stop(&id)? {
            stopped.insert(id);
            continue;
        }
        seen.insert(id);
        let object = db.read(&id)?.ok_or(StoreError::NotFound(id))?;
        stack.extend(object.links()?.into_iter().filter(|l| !seen.contains(l)));
    }
    Ok(seen)
}
