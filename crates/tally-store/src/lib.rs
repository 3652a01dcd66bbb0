//! Content-addressed object storage for Tally.
//!
//! This crate implements a hash-keyed object database analogous to git's
//! `.git/objects/` directory. Blobs, trees, and blocks are stored as immutable
//! objects identified by their domain-separated BLAKE3 hash.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file contents
//! - [`Tree`] -- directory listing mapping names to object references
//! - [`BlockObject`] -- one chain block: tree, ordered parents, signatures, message
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectDatabase`] trait:
//!
//! - [`InMemoryObjectDatabase`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectDatabase`] -- zstd-compressed loose objects on disk
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write objects first, move references afterwards.
//! 3. The database never interprets object contents; codecs live on the
//!    object types themselves.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod snapshot;
pub mod traits;
pub mod walk;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectDatabase;
pub use memory::InMemoryObjectDatabase;
pub use object::{Blob, BlockObject, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use snapshot::{checkout, write_tree, CheckoutSummary, METADATA_DIR};
pub use traits::ObjectDatabase;
pub use walk::reachable;
