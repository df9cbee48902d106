//! Queue lifecycle management
//!
//! Create, truncate, and drop operate on queue metadata and backing slots
//! independently of any transaction. Configuration documents are stored as
//! JSON so they stay inspectable on disk.

use crate::consumer::Partitioning;
use crate::entry::{EntryPointer, EntryRecord, QueueName};
use crate::error::{QueueError, Result};
use crate::keys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_store::TableStore;

/// Configuration a queue is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How consumer groups divide entries among their instances.
    pub partitioning: Partitioning,
    /// Opaque queue properties, compared verbatim on re-create.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            partitioning: Partitioning::Fifo,
            properties: BTreeMap::new(),
        }
    }
}

/// Lifecycle surface for named queues and streams.
#[derive(Clone)]
pub struct QueueAdmin {
    store: Arc<dyn TableStore>,
}

impl QueueAdmin {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Create a queue. Re-creating with an identical configuration is a
    /// no-op; a differing configuration is a conflict.
    pub fn create(&self, queue: &QueueName, config: QueueConfig) -> Result<()> {
        let key = keys::config_key(queue);
        match self.store.get(&key)? {
            Some(bytes) => {
                let existing: QueueConfig = serde_json::from_slice(&bytes)
                    .map_err(|e| QueueError::Codec(e.to_string()))?;
                if existing == config {
                    Ok(())
                } else {
                    Err(QueueError::ConfigConflict(queue.to_string()))
                }
            }
            None => {
                let doc = serde_json::to_vec(&config)
                    .map_err(|e| QueueError::Codec(e.to_string()))?;
                self.store.put(&key, &doc)?;
                tracing::debug!(queue = %queue, "queue created");
                Ok(())
            }
        }
    }

    pub fn exists(&self, queue: &QueueName) -> Result<bool> {
        Ok(self.store.get(&keys::config_key(queue))?.is_some())
    }

    pub fn get_config(&self, queue: &QueueName) -> Result<QueueConfig> {
        match self.store.get(&keys::config_key(queue))? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| QueueError::Codec(e.to_string()))
            }
            None => Err(QueueError::QueueNotFound(queue.to_string())),
        }
    }

    fn require(&self, queue: &QueueName) -> Result<()> {
        if self.exists(queue)? {
            Ok(())
        } else {
            Err(QueueError::QueueNotFound(queue.to_string()))
        }
    }

    fn entry_pointers(&self, queue: &QueueName) -> Result<Vec<EntryPointer>> {
        let prefix = keys::entry_prefix(queue);
        let mut pointers = Vec::new();
        for item in self.store.scan_prefix(&prefix)? {
            let (key, _) = item?;
            pointers.push(keys::pointer_from_entry_key(&key, prefix.len())?);
        }
        Ok(pointers)
    }

    fn marker_keys(&self, queue: &QueueName) -> Result<Vec<Vec<u8>>> {
        let mut marker_keys = Vec::new();
        for item in self.store.scan_prefix(&keys::marker_prefix(queue))? {
            marker_keys.push(item?.0);
        }
        Ok(marker_keys)
    }

    /// Tombstone every existing entry and reset consumer markers to empty.
    /// Queue identity and marker bindings survive.
    pub fn truncate(&self, queue: &QueueName) -> Result<()> {
        self.require(queue)?;
        let tombstone = EntryRecord::tombstone().encode()?;
        for pointer in self.entry_pointers(queue)? {
            self.store.put(&keys::entry_key(queue, pointer), &tombstone)?;
        }
        for key in self.marker_keys(queue)? {
            self.store.delete(&key)?;
        }
        tracing::debug!(queue = %queue, "queue truncated");
        Ok(())
    }

    /// Remove all backing state for the queue. Subsequent operations signal
    /// not-found.
    pub fn drop_queue(&self, queue: &QueueName) -> Result<()> {
        self.require(queue)?;
        for pointer in self.entry_pointers(queue)? {
            self.store.delete(&keys::entry_key(queue, pointer))?;
        }
        for key in self.marker_keys(queue)? {
            self.store.delete(&key)?;
        }
        self.store.delete(&keys::config_key(queue))?;
        tracing::debug!(queue = %queue, "queue dropped");
        Ok(())
    }

    /// Drop every queue in the store.
    pub fn drop_all(&self) -> Result<()> {
        let mut queues = Vec::new();
        for item in self.store.scan_prefix(&keys::CONFIG_SCAN_PREFIX)? {
            let (key, _) = item?;
            queues.push(keys::queue_from_config_key(&key)?);
        }
        for queue in queues {
            self.drop_queue(&queue)?;
        }
        Ok(())
    }
}
