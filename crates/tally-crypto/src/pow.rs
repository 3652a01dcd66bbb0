//! Proof-of-work acceptance rule.
//!
//! A candidate block qualifies when the first `difficulty` hex characters of
//! its hash equal the first `difficulty` hex characters of the genesis hash.
//! The comparison works directly on digest nibbles and never allocates.

use tally_types::ObjectId;

/// Returns `true` iff `candidate` and `genesis` share their first
/// `difficulty` hex characters.
///
/// Prefixes are clamped to each hash's length, so a difficulty longer than
/// both hashes compares them in full.
pub fn is_valid(candidate: &ObjectId, genesis: &ObjectId, difficulty: usize) -> bool {
    let a = candidate.as_bytes();
    let b = genesis.as_bytes();
    let n = difficulty.min(a.len() * 2);
    if n != difficulty.min(b.len() * 2) {
        return false;
    }
    (0..n).all(|i| nibble(a, i) == nibble(b, i))
}

fn nibble(bytes: &[u8], index: usize) -> u8 {
    let byte = bytes[index / 2];
    if index % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0f
    }
}

/// The difficulty target of a chain: a fixed-length hex prefix of genesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DifficultyTarget {
    genesis: ObjectId,
    difficulty: usize,
}

impl DifficultyTarget {
    /// Build a target. Returns `None` when `difficulty` exceeds the number of
    /// hex characters in the genesis hash.
    pub fn new(genesis: ObjectId, difficulty: usize) -> Option<Self> {
        (difficulty <= genesis.hex_len()).then_some(Self {
            genesis,
            difficulty,
        })
    }

    /// Whether `candidate` satisfies this target.
    pub fn is_met_by(&self, candidate: &ObjectId) -> bool {
        is_valid(candidate, &self.genesis, self.difficulty)
    }

    /// The hex prefix every accepted block must start with.
    pub fn prefix(&self) -> String {
        self.genesis.hex_prefix(self.difficulty)
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn genesis(&self) -> &ObjectId {
        &self.genesis
    }
}
