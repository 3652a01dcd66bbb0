//! Parent selection, dating, and message stamping for candidate blocks.

use tally_crypto::expected_parents;
use tally_repo::{Block, ObjectStore};
use tally_types::{BlockTime, ObjectId};

use crate::error::{MinerError, MinerResult};
use crate::request::DateMode;

/// `tip` followed by up to `link_level - 1` ancestors along first-parent
/// links, stopping early at a root.
pub async fn ancestor_window(
    store: &dyn ObjectStore,
    tip: &Block,
    link_level: usize,
) -> MinerResult<Vec<ObjectId>> {
    let mut window = vec![tip.hash];
    let mut next = tip.first_parent();
    while window.len() < link_level {
        let Some(id) = next else { break };
        window.push(id);
        if window.len() < link_level {
            next = store
                .read_block(&id)
                .await?
                .ok_or(MinerError::MissingBlock(id))?
                .first_parent();
        }
    }
    Ok(window)
}

/// Parents for a block mined on `tip`: its ancestor window, then genesis
/// unless the window already ends there.
pub async fn parent_window(
    store: &dyn ObjectStore,
    tip: &Block,
    genesis: ObjectId,
    link_level: usize,
) -> MinerResult<Vec<ObjectId>> {
    let window = ancestor_window(store, tip, link_level).await?;
    Ok(expected_parents(&window, genesis))
}

pub fn author_date(mode: DateMode, genesis: &Block, tip: &Block) -> BlockTime {
    match mode {
        DateMode::CurrentDate => BlockTime::now(),
        DateMode::FirstBlock => genesis.date(),
        DateMode::LastBlock => tip.date(),
        DateMode::LastBlockIncrement => tip.date().increment(),
    }
}

/// `label`, a blank line, then `<stamp> <nonce>` in hex.
pub fn stamped_message(label: Option<&str>, stamp: &str, nonce: u64) -> String {
    match label {
        Some(label) if !label.is_empty() => format!("{label}\n\n{stamp} {nonce:016x}\n"),
        _ => format!("{stamp} {nonce:016x}\n"),
    }
}
