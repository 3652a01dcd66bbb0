use std::sync::{Arc, RwLock};

use serde::Serialize;
use tally_repo::Block;

/// What the miner knows about its chain.
///
/// `last_block` is what the branch ref resolves to after every successful
/// sync or commit; only the mining worker moves it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainState {
    pub first_block: Block,
    pub last_block: Block,
    pub branch_ref: String,
}

/// [`ChainState`] shared between the worker and callers. The lock is never
/// held across an await.
#[derive(Clone, Debug)]
pub(crate) struct SharedState(Arc<RwLock<ChainState>>);

impl SharedState {
    pub fn new(state: ChainState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn get(&self) -> ChainState {
        self.0.read().expect("lock poisoned").clone()
    }

    pub fn first_block(&self) -> Block {
        self.0.read().expect("lock poisoned").first_block.clone()
    }

    pub fn last_block(&self) -> Block {
        self.0.read().expect("lock poisoned").last_block.clone()
    }

    pub fn set_last_block(&self, block: Block) {
        self.0.write().expect("lock poisoned").last_block = block;
    }
}
