//! Resource protocol for transactional participants
//!
//! Every participant in a transaction (producer, consumer) exposes the same
//! five lifecycle operations. A coordinator-facing driver binds a fresh
//! transaction to each participant, collects conflict sets for arbitration,
//! then tells every participant to commit or roll back. Participants hold
//! their binding by composition; there is no base implementation to extend.

use crate::Transaction;
use thiserror::Error;

/// Lifecycle state of one participant binding.
///
/// Legal transitions: `Unbound -> Started -> {Committed, RolledBack}`, with
/// `Committed -> RolledBack` reachable only through rollback-after-commit
/// (undo). A new transaction may be bound only from `Unbound` or a terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No transaction bound.
    Unbound,
    /// A transaction is bound and buffering work.
    Started,
    /// Buffered work was flushed to the store.
    Committed,
    /// The binding was rolled back, possibly after a flush.
    RolledBack,
}

impl ResourceState {
    /// Whether a new transaction may be bound from this state.
    pub fn can_start(self) -> bool {
        !matches!(self, ResourceState::Started)
    }

    /// Whether the binding reached a terminal state.
    pub fn is_finalized(self) -> bool {
        matches!(self, ResourceState::Committed | ResourceState::RolledBack)
    }
}

/// Lifecycle calls arriving out of sequence.
///
/// These are programmer errors: they fail fast and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("transaction started while the previous one was not finalized")]
    ReuseWithoutFinalize,

    #[error("commit called again after commit")]
    AlreadyCommitted,

    #[error("{operation} called after the transaction was finalized")]
    AlreadyFinalized { operation: &'static str },

    #[error("{operation} called without a bound transaction")]
    NotBound { operation: &'static str },

    #[error("acknowledged entry is at or below the committed progress marker")]
    AckBehindMarker,
}

/// Capability contract for participants in a transaction.
pub trait TransactionalResource {
    /// Bind a fresh transaction, clearing any leftover client-side buffer.
    ///
    /// Fails with [`ProtocolError::ReuseWithoutFinalize`] if the previous
    /// transaction on this binding was never committed or rolled back.
    fn start_transaction(&mut self, tx: Transaction) -> Result<(), ProtocolError>;

    /// Keys this participant's pending writes would touch, for conflict
    /// detection against concurrently-committing transactions. Pure-append
    /// participants return the empty set.
    fn conflict_set(&self) -> Vec<Vec<u8>>;

    /// Flush buffered work into the durable store, assigning final sequence
    /// numbers under the bound write pointer.
    ///
    /// Returns `Ok(false)` when the flush fails for a recoverable reason so
    /// the coordinator can decide between retry and abort. Calling again
    /// after a successful commit is a protocol-misuse error.
    fn commit(&mut self) -> Result<bool, ProtocolError>;

    /// Best-effort cleanup of client-side buffers once the coordinator has
    /// confirmed every participant. Failures are logged, never fatal: the
    /// durable write already happened.
    fn post_commit(&mut self);

    /// Undo this binding's work. If `commit` already ran, every flushed
    /// entry is tombstoned; otherwise the buffer is discarded.
    ///
    /// Returns `Ok(false)` when the undo write itself fails. That is a fatal
    /// condition the caller must surface: a non-undone partial write breaks
    /// the visibility invariant.
    fn rollback(&mut self) -> Result<bool, ProtocolError>;
}
