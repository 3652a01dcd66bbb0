use tally_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    /// Invalid settings, a missing genesis, or a chain this miner cannot
    /// continue. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The origin could not be reached, or the mirror could not be brought
    /// up to date. Fatal for the operation in progress.
    #[error("sync failure: {0}")]
    SyncFailure(#[from] tally_sync::SyncError),

    /// The store refused a candidate block, or no candidate met the target
    /// within the attempt budget.
    #[error("mining failure: {0}")]
    MiningFailure(String),

    /// A caller-initiated commit is already outstanding.
    #[error("a commit is already in progress")]
    CommitInProgress,

    /// The mining worker has stopped.
    #[error("miner has shut down")]
    Shutdown,

    /// A block the chain references is not in the mirror.
    #[error("block {0} missing from the mirror")]
    MissingBlock(ObjectId),

    /// A block on the chain breaks the difficulty or link-window rule.
    #[error("invalid block {block}: {reason}")]
    InvalidChain { block: ObjectId, reason: String },

    #[error("store error: {0}")]
    Store(#[from] tally_repo::RepoError),
}

pub type MinerResult<T> = Result<T, MinerError>;
