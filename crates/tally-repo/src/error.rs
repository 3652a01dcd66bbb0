use tally_types::ObjectId;
use thiserror::Error;

/// Errors from block storage.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The backend refused to write a block or tree.
    #[error("object write rejected: {0}")]
    ObjectWrite(String),

    /// The ID names an object that is not a block.
    #[error("{0} is not a block")]
    NotABlock(ObjectId),

    /// A git invocation exited unsuccessfully.
    #[error("git {command} failed ({code:?}): {stderr}")]
    Git {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Output from an external tool could not be interpreted.
    #[error("unexpected output: {0}")]
    Parse(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    #[error("store error: {0}")]
    Store(#[from] tally_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] tally_refs::RefError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
