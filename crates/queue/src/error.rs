//! Error types for the queue engine

use strata_common::ProtocolError;
use strata_store::StoreError;
use thiserror::Error;

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors surfaced by the queue engine
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue was never created, or has been dropped.
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    /// `create` was called for an existing queue with a different
    /// configuration.
    #[error("queue {0} already exists with a different configuration")]
    ConfigConflict(String),

    /// A stored record or key failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// The table store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A lifecycle call arrived out of sequence.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
