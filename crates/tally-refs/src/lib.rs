//! Reference management for Tally.
//!
//! References are the named entry points into a chain, analogous to git refs.
//!
//! - **Branches** (`refs/heads/*`) are mutable pointers to chain tips. Each
//!   coin is mined on its own branch, `coins/<coin>` by default.
//! - **Tags** (`refs/tags/*`) are immutable. The genesis block of every chain
//!   is tagged `genesis`.
//! - **Remote refs** (`refs/remotes/<remote>/*`) record where a remote's
//!   branches stood at the last synchronization.
//!
//! Branch tips only ever move through [`RefStore::compare_and_swap`], so two
//! writers racing on the same branch cannot both win.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- The [`Ref`] type
//! - [`traits`] -- The [`RefStore`] trait defining the storage interface
//! - [`names`] -- Ref name validation and coin branch naming
//! - [`memory`] -- In-memory [`InMemoryRefStore`]
//! - [`fs`] -- File-per-ref [`FsRefStore`]

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::{
    branch_for_coin, validate_branch_name, validate_ref_name, validate_remote_name,
    validate_tag_name,
};
pub use traits::RefStore;
pub use types::Ref;
