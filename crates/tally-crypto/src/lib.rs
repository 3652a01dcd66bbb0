//! Cryptographic primitives for Tally.
//!
//! Provides domain-separated BLAKE3 hashing for native objects, the
//! proof-of-work acceptance rule, and the ancestor link-window rule that ties
//! every block back to genesis.

pub mod chain;
pub mod hasher;
pub mod pow;

pub use chain::{expected_parents, verify_parents, ChainError};
pub use hasher::{domain_hash, BLOB_DOMAIN, BLOCK_DOMAIN, TREE_DOMAIN};
pub use pow::{is_valid, DifficultyTarget};
