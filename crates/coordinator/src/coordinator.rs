//! Coordinator boundary and the in-process implementation
//!
//! `LocalCoordinator` hands out monotonic write pointers and arbitrates
//! commits first-committer-wins: a commit is refused when any transaction
//! the caller cannot see has committed an overlapping conflict set. Aborted
//! write pointers stay excluded from every later snapshot, so entries from a
//! crashed producer are invisible even before its tombstones land.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use strata_common::Transaction;

/// The boundary the engine calls to coordinate transactions.
pub trait TransactionCoordinator: Send + Sync {
    /// Open a transaction with a fresh write pointer and a read snapshot.
    fn begin_transaction(&self) -> Transaction;

    /// Whether `tx` may commit given the keys its participants would touch.
    /// Recording happens here; a refusal means the caller must abort.
    fn can_commit(&self, tx: &Transaction, conflict_set: Vec<Vec<u8>>) -> bool;

    /// Finalize a transaction whose participants all committed. Returns
    /// false if the transaction is unknown or was already aborted.
    fn commit(&self, tx: &Transaction) -> bool;

    /// Abandon a transaction. Its write pointer becomes permanently
    /// invisible to later snapshots.
    fn abort(&self, tx: &Transaction);
}

#[derive(Default)]
struct CoordinatorState {
    next_write_pointer: u64,
    in_progress: BTreeSet<u64>,
    /// Aborted pointers, excluded from every later snapshot.
    invalid: BTreeSet<u64>,
    /// Conflict sets of committed transactions, kept while any concurrent
    /// transaction could still collide with them.
    committed: BTreeMap<u64, Vec<Vec<u8>>>,
    /// Conflict sets recorded at can_commit, pending finalization.
    pending: HashMap<u64, Vec<Vec<u8>>>,
}

/// In-process coordinator for single-node and test deployments.
#[derive(Clone, Default)]
pub struct LocalCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
}

impl LocalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionCoordinator for LocalCoordinator {
    fn begin_transaction(&self) -> Transaction {
        let mut state = self.state.lock();
        state.next_write_pointer += 1;
        let write_pointer = state.next_write_pointer;

        // The snapshot may read everything assigned so far except what is
        // still in flight or was invalidated.
        let read_pointer = write_pointer - 1;
        let mut excluded = state.invalid.clone();
        excluded.extend(state.in_progress.iter().copied());
        state.in_progress.insert(write_pointer);

        Transaction::new(write_pointer, read_pointer, excluded)
    }

    fn can_commit(&self, tx: &Transaction, conflict_set: Vec<Vec<u8>>) -> bool {
        let mut state = self.state.lock();
        if !state.in_progress.contains(&tx.write_pointer()) {
            return false;
        }
        // First-committer-wins: anything this transaction cannot see
        // committed concurrently.
        for (&pointer, keys) in &state.committed {
            if tx.is_visible(pointer) {
                continue;
            }
            if keys.iter().any(|key| conflict_set.contains(key)) {
                tracing::debug!(
                    write_pointer = tx.write_pointer(),
                    conflicting_pointer = pointer,
                    "commit refused on write-write conflict"
                );
                return false;
            }
        }
        state.pending.insert(tx.write_pointer(), conflict_set);
        true
    }

    fn commit(&self, tx: &Transaction) -> bool {
        let mut state = self.state.lock();
        let write_pointer = tx.write_pointer();
        if !state.in_progress.remove(&write_pointer) {
            return false;
        }
        let keys = state.pending.remove(&write_pointer).unwrap_or_default();
        if !keys.is_empty() {
            state.committed.insert(write_pointer, keys);
        }
        // Once nothing is in flight, no future snapshot can conflict with
        // the recorded sets; they are all visible history.
        if state.in_progress.is_empty() {
            state.committed.clear();
        }
        true
    }

    fn abort(&self, tx: &Transaction) {
        let mut state = self.state.lock();
        let write_pointer = tx.write_pointer();
        state.in_progress.remove(&write_pointer);
        state.pending.remove(&write_pointer);
        state.invalid.insert(write_pointer);
        tracing::debug!(write_pointer, "transaction aborted");
    }
}
