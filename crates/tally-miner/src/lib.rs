//! Proof-of-work mining for Tally.
//!
//! A [`Miner`] owns a single worker task fed by a [`MiningQueue`] of
//! [`PendingBlockRequest`]s. For each request the worker links the new block
//! to the ancestor window behind the current tip, searches nonces until the
//! block hash carries the genesis prefix, then advances the local branch and
//! pushes it to the origin. When the origin has moved ahead the request's
//! [`StaleAction`] decides what happens next.
//!
//! [`ChainBootstrap`] attaches a mirror and, for a chain that is still only
//! genesis, mines the linked prefix every later block depends on.
//! [`verify_chain`] audits a finished chain.

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod miner;
pub mod queue;
pub mod request;
pub mod state;
pub mod verify;
pub mod window;

mod worker;

#[cfg(test)]
mod testing;

pub use backend::open_setup;
pub use bootstrap::ChainBootstrap;
pub use config::{Backend, MinerConfig};
pub use error::{MinerError, MinerResult};
pub use miner::{Miner, MinerSetup, MinerStatus, MiningSettings};
pub use queue::MiningQueue;
pub use request::{Completion, DateMode, PendingBlockRequest, Snapshot, StaleAction};
pub use state::ChainState;
pub use verify::{verify_chain, ChainReport};
