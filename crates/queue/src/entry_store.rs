//! Ordered, append-only backing for one named queue
//!
//! Appending an entry and marking one undone are both single atomic key
//! writes to the table store. That, not in-process locking, is what keeps
//! the structure correct when producers and consumers run in different
//! processes.

use crate::entry::{EntryPointer, EntryRecord, QueueEntry, QueueName};
use crate::error::Result;
use crate::keys;
use std::sync::Arc;
use strata_store::TableStore;

/// Handle to one queue's entry slots in the table store.
#[derive(Clone)]
pub struct EntryStore {
    queue: QueueName,
    store: Arc<dyn TableStore>,
}

impl EntryStore {
    pub fn new(queue: QueueName, store: Arc<dyn TableStore>) -> Self {
        Self { queue, store }
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Write one committed entry at `pointer`. Uniqueness of the pointer is
    /// the caller's responsibility; sequence numbers are assigned at commit
    /// time, never at buffer time.
    pub fn append(&self, pointer: EntryPointer, entry: &QueueEntry) -> Result<()> {
        let record = EntryRecord::committed(entry.clone());
        self.store
            .put(&keys::entry_key(&self.queue, pointer), &record.encode()?)?;
        Ok(())
    }

    /// Overwrite the slot at `pointer` with a tombstone. The slot survives,
    /// preserving ordering and space accounting for later readers.
    pub fn undo(&self, pointer: EntryPointer) -> Result<()> {
        self.store.put(
            &keys::entry_key(&self.queue, pointer),
            &EntryRecord::tombstone().encode()?,
        )?;
        Ok(())
    }

    /// Iterate records in pointer order, starting strictly after `after`
    /// (or from the first slot when `after` is `None`).
    pub fn scan_after(
        &self,
        after: Option<EntryPointer>,
    ) -> Result<Box<dyn Iterator<Item = Result<(EntryPointer, EntryRecord)>> + '_>> {
        let prefix = keys::entry_prefix(&self.queue);
        let iter = match after {
            Some(pointer) => self
                .store
                .scan_after(&prefix, &keys::entry_key(&self.queue, pointer))?,
            None => self.store.scan_prefix(&prefix)?,
        };
        let prefix_len = prefix.len();
        Ok(Box::new(iter.map(move |item| {
            let (key, value) = item?;
            let pointer = keys::pointer_from_entry_key(&key, prefix_len)?;
            let record = EntryRecord::decode(&value)?;
            Ok((pointer, record))
        })))
    }
}
