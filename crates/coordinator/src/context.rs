//! Transaction driver
//!
//! Walks a set of participants through one unit of work: bind them all to a
//! fresh transaction, collect conflict sets, ask the coordinator, commit or
//! roll back every participant, finalize. Participants are passed to each
//! call rather than held, so the caller keeps using them for buffered
//! operations between `begin` and `commit`.

use crate::coordinator::TransactionCoordinator;
use strata_common::{ProtocolError, TransactionalResource};
use thiserror::Error;

/// Participant list, as the driver sees it.
pub type Participants<'a> = [&'a mut dyn TransactionalResource];

/// Errors surfaced while driving a transaction
#[derive(Debug, Error)]
pub enum ContextError {
    /// The coordinator refused the commit; everything was rolled back.
    #[error("transaction aborted on conflict")]
    Conflict,

    /// A participant reported a recoverable flush failure and the
    /// transaction was rolled back.
    #[error("participant flush failed; transaction rolled back")]
    FlushFailed,

    /// A participant could not undo flushed writes. Partial state may be
    /// visible; this must reach the operator.
    #[error("rollback failed; partial writes may remain")]
    RollbackFailed,

    /// A lifecycle call arrived out of sequence.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No transaction is open on this context.
    #[error("no transaction in progress")]
    NotStarted,
}

/// Drives participants through begin / commit / rollback against one
/// coordinator.
pub struct TransactionContext<'c, C: TransactionCoordinator> {
    coordinator: &'c C,
    tx: Option<strata_common::Transaction>,
}

impl<'c, C: TransactionCoordinator> TransactionContext<'c, C> {
    pub fn new(coordinator: &'c C) -> Self {
        Self {
            coordinator,
            tx: None,
        }
    }

    /// The open transaction, if any.
    pub fn transaction(&self) -> Option<&strata_common::Transaction> {
        self.tx.as_ref()
    }

    /// Begin a transaction and bind every participant to it.
    pub fn begin(
        &mut self,
        participants: &mut Participants<'_>,
    ) -> Result<strata_common::Transaction, ContextError> {
        let tx = self.coordinator.begin_transaction();
        for participant in participants.iter_mut() {
            participant.start_transaction(tx.clone())?;
        }
        self.tx = Some(tx.clone());
        Ok(tx)
    }

    /// Try to commit: collect conflict sets, arbitrate, flush participants,
    /// finalize. Any refusal or flush failure rolls the whole transaction
    /// back before the error is returned.
    pub fn commit(&mut self, participants: &mut Participants<'_>) -> Result<(), ContextError> {
        let tx = self.tx.take().ok_or(ContextError::NotStarted)?;

        let mut conflict_set = Vec::new();
        for participant in participants.iter_mut() {
            conflict_set.extend(participant.conflict_set());
        }

        if !self.coordinator.can_commit(&tx, conflict_set) {
            let undone = rollback_participants(participants);
            self.coordinator.abort(&tx);
            return if undone {
                Err(ContextError::Conflict)
            } else {
                Err(ContextError::RollbackFailed)
            };
        }

        for index in 0..participants.len() {
            let flushed = match participants[index].commit() {
                Ok(flushed) => flushed,
                Err(e) => {
                    let undone = rollback_participants(participants);
                    self.coordinator.abort(&tx);
                    return if undone {
                        Err(e.into())
                    } else {
                        Err(ContextError::RollbackFailed)
                    };
                }
            };
            if !flushed {
                // Participants before `index` already flushed; undo them too.
                let undone = rollback_participants(participants);
                self.coordinator.abort(&tx);
                return if undone {
                    Err(ContextError::FlushFailed)
                } else {
                    Err(ContextError::RollbackFailed)
                };
            }
        }

        if !self.coordinator.commit(&tx) {
            let undone = rollback_participants(participants);
            return if undone {
                Err(ContextError::Conflict)
            } else {
                Err(ContextError::RollbackFailed)
            };
        }

        for participant in participants.iter_mut() {
            participant.post_commit();
        }
        Ok(())
    }

    /// Abandon the open transaction, rolling every participant back.
    pub fn abort(&mut self, participants: &mut Participants<'_>) -> Result<(), ContextError> {
        let tx = self.tx.take().ok_or(ContextError::NotStarted)?;
        let undone = rollback_participants(participants);
        self.coordinator.abort(&tx);
        if undone {
            Ok(())
        } else {
            Err(ContextError::RollbackFailed)
        }
    }
}

/// Roll back every participant, reporting whether all undo work succeeded.
/// A participant that was never started is skipped; one that cannot undo is
/// fatal and reported, never swallowed.
fn rollback_participants(participants: &mut Participants<'_>) -> bool {
    let mut undone = true;
    for participant in participants.iter_mut() {
        match participant.rollback() {
            Ok(true) => {}
            Ok(false) => undone = false,
            // Not started or already finalized: nothing to undo.
            Err(ProtocolError::NotBound { .. }) | Err(ProtocolError::AlreadyFinalized { .. }) => {}
            Err(e) => {
                tracing::error!(error = %e, "participant rollback rejected");
                undone = false;
            }
        }
    }
    undone
}
