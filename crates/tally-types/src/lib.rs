//! Foundation types for Tally.
//!
//! This crate provides the identity, temporal, and addressing types shared by
//! every other Tally crate.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 or git SHA-1 digest)
//! - [`BlockTime`] -- Second-resolution timestamp with a UTC offset, as stamped on blocks
//! - [`Person`] / [`Signature`] -- Author and committer lines of a block
//! - [`ChainIdentity`] -- The fixed identity every mined block is signed with

pub mod error;
pub mod identity;
pub mod object;
pub mod temporal;

pub use error::TypeError;
pub use identity::{ChainIdentity, Person, Signature};
pub use object::ObjectId;
pub use temporal::BlockTime;
