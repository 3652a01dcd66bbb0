use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The origin has no genesis under the configured reference.
    #[error("origin has no genesis at {0}")]
    GenesisMissing(String),

    /// The origin already holds a chain where a new one was requested.
    #[error("origin already initialized: {0}")]
    OriginExists(String),

    /// The origin could not be reached or refused the operation.
    #[error("remote error: {0}")]
    RemoteError(String),

    /// The local mirror is missing data it must have.
    #[error("mirror is inconsistent: {0}")]
    Inconsistent(String),

    #[error("repository error: {0}")]
    Repo(#[from] tally_repo::RepoError),

    #[error("store error: {0}")]
    Store(#[from] tally_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] tally_refs::RefError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
