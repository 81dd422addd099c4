//! Error types for datumflow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("job chain is not initialized")]
    NotInitialized,

    #[error("job chain is already initialized")]
    AlreadyInitialized,

    #[error("job not found in job chain")]
    JobNotFound,

    #[error("cannot succeed a job with remaining datums: {unyielded} + {yielding} of {total}")]
    DatumsRemaining {
        unyielded: usize,
        yielding: usize,
        total: usize,
    },

    #[error("job has unyielded datums but is not waiting on anything")]
    DatumsStalled,

    #[error("additive-only job had multiple ancestors")]
    MultipleAncestors,

    #[error("{0} unhandled datums were not yielded during iteration")]
    DatumsUnhandled(usize),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
