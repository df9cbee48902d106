//! Transactional consumer
//!
//! A consumer reads the write-pointer-ordered, tombstone-filtered view of a
//! queue, starting from its durable progress marker. Acknowledgments buffer
//! in memory and become durable as a single marker write at commit, which is
//! also the only key a consumer can conflict on: two consumers of the same
//! group and instance advancing the same marker collide at the coordinator,
//! and one of them aborts.

use crate::entry::{EntryPointer, QueueEntry, QueueName};
use crate::entry_store::EntryStore;
use crate::error::Result;
use crate::keys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_common::{ProtocolError, ResourceState, Transaction, TransactionalResource};
use strata_store::TableStore;

/// How entries are divided among the instances of a consumer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partitioning {
    /// Every entry goes to the group's single instance.
    Fifo,
    /// Entries rotate across instances by position.
    RoundRobin,
    /// Entries hash on the named entry hash key; entries without that key
    /// fall back to round-robin.
    HashKey(String),
}

/// Identity of one consumer within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerGroup {
    pub group_id: u64,
    pub instance_id: u32,
    pub group_size: u32,
}

impl ConsumerGroup {
    pub fn new(group_id: u64, instance_id: u32, group_size: u32) -> Self {
        Self {
            group_id,
            instance_id,
            group_size,
        }
    }

    /// The common case: a group with exactly one instance.
    pub fn single(group_id: u64) -> Self {
        Self::new(group_id, 0, 1)
    }
}

/// Marker-tracking consumer bound to one queue.
pub struct QueueConsumer {
    entries: EntryStore,
    store: Arc<dyn TableStore>,
    group: ConsumerGroup,
    partitioning: Partitioning,
    tx: Option<Transaction>,
    state: ResourceState,
    /// Durable progress marker, loaded lazily per transaction.
    marker: Option<EntryPointer>,
    marker_loaded: bool,
    /// Acknowledgments buffered in this transaction.
    acked: BTreeSet<EntryPointer>,
    /// Previous durable marker, captured when commit writes a new one.
    /// Present only between a successful commit and finalization.
    undo_marker: Option<Option<EntryPointer>>,
}

impl std::fmt::Debug for QueueConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConsumer")
            .field("queue", self.entries.queue())
            .field("group", &self.group)
            .field("partitioning", &self.partitioning)
            .field("tx", &self.tx)
            .field("state", &self.state)
            .field("marker", &self.marker)
            .field("marker_loaded", &self.marker_loaded)
            .field("acked", &self.acked)
            .field("undo_marker", &self.undo_marker)
            .finish()
    }
}

impl QueueConsumer {
    pub(crate) fn new(
        queue: QueueName,
        store: Arc<dyn TableStore>,
        group: ConsumerGroup,
        partitioning: Partitioning,
    ) -> Self {
        Self {
            entries: EntryStore::new(queue, store.clone()),
            store,
            group,
            partitioning,
            tx: None,
            state: ResourceState::Unbound,
            marker: None,
            marker_loaded: false,
            acked: BTreeSet::new(),
            undo_marker: None,
        }
    }

    pub fn queue(&self) -> &QueueName {
        self.entries.queue()
    }

    pub fn group(&self) -> ConsumerGroup {
        self.group
    }

    fn marker_key(&self) -> Vec<u8> {
        keys::marker_key(
            self.entries.queue(),
            self.group.group_id,
            self.group.instance_id,
        )
    }

    fn ensure_marker(&mut self) -> Result<()> {
        if self.marker_loaded {
            return Ok(());
        }
        self.marker = match self.store.get(&self.marker_key())? {
            Some(bytes) => Some(EntryPointer::decode(&bytes)?),
            None => None,
        };
        self.marker_loaded = true;
        Ok(())
    }

    fn assigned(&self, pointer: EntryPointer, entry: &QueueEntry) -> bool {
        let size = u64::from(self.group.group_size.max(1));
        let instance = u64::from(self.group.instance_id);
        let rotation = (pointer.write_pointer + u64::from(pointer.sequence)) % size;
        match &self.partitioning {
            Partitioning::Fifo => self.group.instance_id == 0,
            Partitioning::RoundRobin => rotation == instance,
            Partitioning::HashKey(key) => match entry.hash_keys.get(key) {
                Some(value) => u64::from(*value) % size == instance,
                None => rotation == instance,
            },
        }
    }

    fn require_started(&self, operation: &'static str) -> std::result::Result<(), ProtocolError> {
        match self.state {
            ResourceState::Started => Ok(()),
            ResourceState::Unbound => Err(ProtocolError::NotBound { operation }),
            _ => Err(ProtocolError::AlreadyFinalized { operation }),
        }
    }

    /// Up to `batch_size` visible, not-yet-acknowledged entries assigned to
    /// this instance, in pointer order. Restartable: after a crash, a fresh
    /// consumer resumes from the durable marker.
    pub fn dequeue(&mut self, batch_size: usize) -> Result<Vec<(EntryPointer, QueueEntry)>> {
        self.require_started("dequeue")?;
        self.ensure_marker()?;
        let tx = match self.tx.clone() {
            Some(tx) => tx,
            None => return Err(ProtocolError::NotBound { operation: "dequeue" }.into()),
        };

        let mut batch = Vec::new();
        for item in self.entries.scan_after(self.marker)? {
            if batch.len() >= batch_size {
                break;
            }
            let (pointer, record) = item?;
            if record.is_undone() {
                continue;
            }
            if !tx.is_visible(pointer.write_pointer) {
                continue;
            }
            if self.acked.contains(&pointer) {
                continue;
            }
            if !self.assigned(pointer, &record.entry) {
                continue;
            }
            batch.push((pointer, record.entry));
        }
        Ok(batch)
    }

    /// Buffer acknowledgment for entries returned by `dequeue`. Durable only
    /// when the owning transaction commits.
    pub fn ack(&mut self, pointers: &[EntryPointer]) -> Result<()> {
        self.require_started("ack")?;
        self.ensure_marker()?;
        for pointer in pointers {
            if let Some(marker) = self.marker {
                if *pointer <= marker {
                    return Err(ProtocolError::AckBehindMarker.into());
                }
            }
            self.acked.insert(*pointer);
        }
        Ok(())
    }
}

impl TransactionalResource for QueueConsumer {
    fn start_transaction(&mut self, tx: Transaction) -> std::result::Result<(), ProtocolError> {
        if !self.state.can_start() {
            return Err(ProtocolError::ReuseWithoutFinalize);
        }
        self.tx = Some(tx);
        self.acked.clear();
        self.undo_marker = None;
        // Reload per transaction so a restarted or truncated marker is
        // picked up.
        self.marker = None;
        self.marker_loaded = false;
        self.state = ResourceState::Started;
        Ok(())
    }

    /// The marker key this transaction intends to advance. Two transactions
    /// advancing the same marker necessarily cover overlapping ranges, so
    /// key-level conflict is exactly range-overlap conflict.
    fn conflict_set(&self) -> Vec<Vec<u8>> {
        if self.acked.is_empty() {
            Vec::new()
        } else {
            vec![self.marker_key()]
        }
    }

    fn commit(&mut self) -> std::result::Result<bool, ProtocolError> {
        match self.state {
            ResourceState::Started => {}
            ResourceState::Committed => return Err(ProtocolError::AlreadyCommitted),
            _ => return Err(ProtocolError::NotBound { operation: "commit" }),
        }

        if let Some(new_marker) = self.acked.iter().next_back().copied() {
            let previous = self.marker;
            if let Err(e) = self.store.put(&self.marker_key(), &new_marker.encode()) {
                tracing::warn!(
                    queue = %self.entries.queue(),
                    group = self.group.group_id,
                    instance = self.group.instance_id,
                    error = %e,
                    "marker advance failed"
                );
                return Ok(false);
            }
            self.undo_marker = Some(previous);
            self.marker = Some(new_marker);
        }
        self.state = ResourceState::Committed;
        Ok(true)
    }

    fn post_commit(&mut self) {
        self.acked.clear();
        self.undo_marker = None;
    }

    fn rollback(&mut self) -> std::result::Result<bool, ProtocolError> {
        match self.state {
            ResourceState::Started => {
                self.acked.clear();
                self.state = ResourceState::RolledBack;
                Ok(true)
            }
            ResourceState::Committed => {
                if let Some(previous) = self.undo_marker {
                    let restore = match previous {
                        Some(pointer) => self.store.put(&self.marker_key(), &pointer.encode()),
                        None => self.store.delete(&self.marker_key()),
                    };
                    if let Err(e) = restore {
                        tracing::error!(
                            queue = %self.entries.queue(),
                            group = self.group.group_id,
                            instance = self.group.instance_id,
                            error = %e,
                            "marker undo failed; committed marker remains advanced"
                        );
                        return Ok(false);
                    }
                    self.marker = previous;
                    self.undo_marker = None;
                }
                self.acked.clear();
                self.state = ResourceState::RolledBack;
                Ok(true)
            }
            ResourceState::RolledBack => {
                Err(ProtocolError::AlreadyFinalized { operation: "rollback" })
            }
            ResourceState::Unbound => Err(ProtocolError::NotBound { operation: "rollback" }),
        }
    }
}
