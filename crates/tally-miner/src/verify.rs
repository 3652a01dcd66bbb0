//! Whole-chain audit: difficulty and link windows from tip back to genesis.

use serde::Serialize;
use tally_crypto::{expected_parents, is_valid, verify_parents};
use tally_repo::{Block, ObjectStore};
use tally_types::ObjectId;

use crate::error::{MinerError, MinerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub genesis: ObjectId,
    pub tip: ObjectId,
    /// Blocks on the first-parent path, genesis included.
    pub length: usize,
}

/// Check every block between `tip` and `genesis`.
///
/// Each non-genesis block must match the difficulty prefix and list exactly
/// its `link_level` nearest first-parent ancestors, plus genesis when the
/// window does not already end there.
pub async fn verify_chain(
    store: &dyn ObjectStore,
    tip: ObjectId,
    genesis: ObjectId,
    difficulty: usize,
    link_level: usize,
) -> MinerResult<ChainReport> {
    let mut path: Vec<Block> = Vec::new();
    let mut next = Some(tip);
    while let Some(hash) = next {
        let block = store
            .read_block(&hash)
            .await?
            .ok_or(MinerError::MissingBlock(hash))?;
        next = block.first_parent();
        path.push(block);
    }
    let root = path.last().map(|b| b.hash);
    if root != Some(genesis) {
        return Err(MinerError::InvalidChain {
            block: tip,
            reason: format!("first-parent path ends at {root:?}, not genesis"),
        });
    }

    for (i, block) in path.iter().enumerate().take(path.len() - 1) {
        if !is_valid(&block.hash, &genesis, difficulty) {
            return Err(MinerError::InvalidChain {
                block: block.hash,
                reason: format!("hash misses difficulty prefix {}", genesis.hex_prefix(difficulty)),
            });
        }
        let window: Vec<ObjectId> = path[i + 1..]
            .iter()
            .take(link_level)
            .map(|b| b.hash)
            .collect();
        verify_parents(&block.parents, &expected_parents(&window, genesis)).map_err(|e| {
            MinerError::InvalidChain {
                block: block.hash,
                reason: e.to_string(),
            }
        })?;
    }

    Ok(ChainReport {
        genesis,
        tip,
        length: path.len(),
    })
}
