//! Remote synchronization for Tally.
//!
//! A miner works in a local mirror of an authoritative origin. [`RemoteSync`]
//! is the seam between the two:
//!
//! - `attach` initializes the mirror from the origin, anchored at the genesis
//!   reference.
//! - `synchronize` discards local changes, fetches, and fast-forwards the
//!   local branch to the origin's tip. The origin always wins.
//! - `push` publishes a new tip. A remote that has moved ahead is reported as
//!   `Ok(false)`: staleness is an expected outcome, not an error.
//!
//! [`MirrorSync`] implements this for native repositories over any
//! [`RemoteTransport`]; [`LocalTransport`] serves an origin held in a bare
//! directory or in memory. [`GitSync`] drives `git` against a git origin.

pub mod error;
pub mod git_sync;
pub mod mirror;
pub mod origin;
pub mod traits;
pub mod transport;

pub use error::{SyncError, SyncResult};
pub use git_sync::GitSync;
pub use mirror::{is_ancestor, MirrorSync};
pub use origin::{init_git_origin, init_native_origin, GENESIS_MESSAGE};
pub use traits::RemoteSync;
pub use transport::{copy_missing, LocalTransport, RemoteTransport};
