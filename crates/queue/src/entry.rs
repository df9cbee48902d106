//! Queue identity and entry types
//!
//! The ordering key for entries is `(write_pointer, sequence)`. Both halves
//! are encoded big-endian so lexicographic key order in the table store is
//! numeric order. Undone entries keep their storage slot as tombstones;
//! readers can tell "never existed" apart from "written then rolled back".

use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespaced logical identity of a queue or stream.
///
/// Identity is independent of any transaction's lifecycle; queues are
/// created and destroyed only through the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueName {
    namespace: String,
    name: String,
}

impl QueueName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One buffered unit of data: an opaque payload plus the partitioning
/// metadata consumers may hash on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub payload: Vec<u8>,
    pub hash_keys: BTreeMap<String, u32>,
}

impl QueueEntry {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            hash_keys: BTreeMap::new(),
        }
    }

    pub fn with_hash_key(mut self, key: impl Into<String>, value: u32) -> Self {
        self.hash_keys.insert(key.into(), value);
        self
    }
}

/// Position of one entry within a queue: the transaction's write pointer and
/// the sequence number assigned at commit. No two entries of the same queue
/// share a pointer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntryPointer {
    pub write_pointer: u64,
    pub sequence: u32,
}

impl EntryPointer {
    pub const ENCODED_LEN: usize = 12;

    pub fn new(write_pointer: u64, sequence: u32) -> Self {
        Self {
            write_pointer,
            sequence,
        }
    }

    /// Big-endian encoding; lexicographic order equals `(write_pointer,
    /// sequence)` order.
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..8].copy_from_slice(&self.write_pointer.to_be_bytes());
        buf[8..12].copy_from_slice(&self.sequence.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(QueueError::Codec(format!(
                "expected {} bytes for entry pointer, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            )));
        }
        let mut wp = [0u8; 8];
        wp.copy_from_slice(&bytes[0..8]);
        let mut seq = [0u8; 4];
        seq.copy_from_slice(&bytes[8..12]);
        Ok(Self {
            write_pointer: u64::from_be_bytes(wp),
            sequence: u32::from_be_bytes(seq),
        })
    }
}

impl fmt::Display for EntryPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.write_pointer, self.sequence)
    }
}

/// Whether a stored entry is live or was undone by a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    Committed,
    Undone,
}

/// What the entry store persists for one pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub state: EntryState,
    pub entry: QueueEntry,
}

impl EntryRecord {
    pub fn committed(entry: QueueEntry) -> Self {
        Self {
            state: EntryState::Committed,
            entry,
        }
    }

    /// Tombstone marker. The payload is dropped; the slot survives so
    /// ordering and space accounting are preserved.
    pub fn tombstone() -> Self {
        Self {
            state: EntryState::Undone,
            entry: QueueEntry::default(),
        }
    }

    pub fn is_undone(&self) -> bool {
        self.state == EntryState::Undone
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| QueueError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| QueueError::Codec(e.to_string()))
    }
}
