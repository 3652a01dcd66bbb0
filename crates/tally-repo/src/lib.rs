//! Block storage for Tally.
//!
//! [`ObjectStore`] is the narrow seam the miner talks to: snapshot a working
//! directory into a tree, write a block, read a block back, resolve and
//! compare-and-swap refs, and collect garbage. Two interchangeable backends
//! implement it:
//!
//! - [`NativeObjectStore`] keeps blocks in a Tally object database
//!   (BLAKE3-addressed) with file-per-ref branches; no external tools.
//! - [`GitObjectStore`] drives a real git repository through [`GitCli`],
//!   so every block is an ordinary git commit.
//!
//! The chain identity travels inside each [`BlockDraft`]; neither backend
//! reads or mutates process-wide state to stamp authorship.

pub mod block;
pub mod error;
pub mod git;
pub mod git_store;
pub mod native;
pub mod traits;

pub use block::{Block, BlockDraft};
pub use error::{RepoError, RepoResult};
pub use git::{GitCli, GitOutput};
pub use git_store::GitObjectStore;
pub use native::NativeObjectStore;
pub use traits::ObjectStore;
