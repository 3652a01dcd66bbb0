use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid digest length: expected 20 or 32 bytes, got {actual}")]
    InvalidLength { actual: usize },

    #[error("invalid block time: {0}")]
    InvalidTime(String),

    #[error("invalid signature line: {0}")]
    InvalidSignature(String),

    #[error("invalid person: {0}")]
    InvalidPerson(String),
}
