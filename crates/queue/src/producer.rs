//! Transactional producer
//!
//! Entries buffer in memory until commit, then flush in insertion order
//! under the bound transaction's write pointer with sequence numbers
//! assigned on the way out. Nothing a producer buffers is visible to any
//! reader until the owning transaction commits.

use crate::entry::{EntryPointer, QueueEntry, QueueName};
use crate::entry_store::EntryStore;
use crate::error::Result;
use strata_common::{ProtocolError, ResourceState, Transaction, TransactionalResource};

/// Buffering producer bound to one queue.
pub struct QueueProducer {
    entries: EntryStore,
    buffer: Vec<QueueEntry>,
    tx: Option<Transaction>,
    state: ResourceState,
    /// Entries actually written to the store, which can trail the buffer
    /// length after a partial flush. Rollback undoes exactly this prefix.
    flushed: u32,
}

impl std::fmt::Debug for QueueProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProducer")
            .field("queue", self.entries.queue())
            .field("buffered", &self.buffer.len())
            .field("tx", &self.tx)
            .field("state", &self.state)
            .field("flushed", &self.flushed)
            .finish()
    }
}

impl QueueProducer {
    pub(crate) fn new(entries: EntryStore) -> Self {
        Self {
            entries,
            buffer: Vec::new(),
            tx: None,
            state: ResourceState::Unbound,
            flushed: 0,
        }
    }

    pub fn queue(&self) -> &QueueName {
        self.entries.queue()
    }

    /// Buffer one entry for the current transaction.
    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<()> {
        match self.state {
            ResourceState::Started => {
                self.buffer.push(entry);
                Ok(())
            }
            ResourceState::Unbound => {
                Err(ProtocolError::NotBound { operation: "enqueue" }.into())
            }
            _ => Err(ProtocolError::AlreadyFinalized { operation: "enqueue" }.into()),
        }
    }

    /// Buffer a batch of entries, preserving iteration order.
    pub fn enqueue_all(&mut self, entries: impl IntoIterator<Item = QueueEntry>) -> Result<()> {
        for entry in entries {
            self.enqueue(entry)?;
        }
        Ok(())
    }
}

impl TransactionalResource for QueueProducer {
    fn start_transaction(&mut self, tx: Transaction) -> std::result::Result<(), ProtocolError> {
        if !self.state.can_start() {
            return Err(ProtocolError::ReuseWithoutFinalize);
        }
        self.tx = Some(tx);
        self.buffer.clear();
        self.flushed = 0;
        self.state = ResourceState::Started;
        Ok(())
    }

    /// Appends never conflict: sequence numbers are assigned at commit time,
    /// so concurrent producers to the same queue are always compatible.
    fn conflict_set(&self) -> Vec<Vec<u8>> {
        Vec::new()
    }

    fn commit(&mut self) -> std::result::Result<bool, ProtocolError> {
        match self.state {
            ResourceState::Started => {}
            ResourceState::Committed => return Err(ProtocolError::AlreadyCommitted),
            _ => return Err(ProtocolError::NotBound { operation: "commit" }),
        }
        let write_pointer = match self.tx.as_ref() {
            Some(tx) => tx.write_pointer(),
            None => return Err(ProtocolError::NotBound { operation: "commit" }),
        };

        // A retried commit resumes after the prefix that already landed.
        for (sequence, entry) in self.buffer.iter().enumerate().skip(self.flushed as usize) {
            let pointer = EntryPointer::new(write_pointer, sequence as u32);
            if let Err(e) = self.entries.append(pointer, entry) {
                tracing::warn!(
                    queue = %self.entries.queue(),
                    write_pointer,
                    sequence = pointer.sequence,
                    error = %e,
                    "enqueue flush failed"
                );
                return Ok(false);
            }
            self.flushed += 1;
        }
        self.state = ResourceState::Committed;
        Ok(true)
    }

    fn post_commit(&mut self) {
        // Drop references to committed entries.
        self.buffer.clear();
    }

    fn rollback(&mut self) -> std::result::Result<bool, ProtocolError> {
        match self.state {
            ResourceState::Started | ResourceState::Committed => {}
            ResourceState::RolledBack => {
                return Err(ProtocolError::AlreadyFinalized { operation: "rollback" })
            }
            ResourceState::Unbound => {
                return Err(ProtocolError::NotBound { operation: "rollback" })
            }
        }
        let write_pointer = match self.tx.as_ref() {
            Some(tx) => tx.write_pointer(),
            None => return Err(ProtocolError::NotBound { operation: "rollback" }),
        };

        let mut undone = true;
        for sequence in 0..self.flushed {
            let pointer = EntryPointer::new(write_pointer, sequence);
            if let Err(e) = self.entries.undo(pointer) {
                tracing::error!(
                    queue = %self.entries.queue(),
                    write_pointer,
                    sequence,
                    error = %e,
                    "undo of flushed entry failed; a partial write may remain visible"
                );
                undone = false;
            }
        }
        if undone {
            self.buffer.clear();
            self.state = ResourceState::RolledBack;
        }
        Ok(undone)
    }
}
