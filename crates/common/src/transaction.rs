//! Transaction handle
//!
//! A `Transaction` describes one logical unit of work: the write pointer its
//! buffered writes will land under, and the set of write pointers its reads
//! may observe. Handles are immutable; the coordinator constructs one at
//! begin and discards it after commit or rollback completes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Immutable description of a transaction's write target and read snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    write_pointer: u64,
    read_pointer: u64,
    excluded: BTreeSet<u64>,
}

impl Transaction {
    pub fn new(write_pointer: u64, read_pointer: u64, excluded: BTreeSet<u64>) -> Self {
        Self {
            write_pointer,
            read_pointer,
            excluded,
        }
    }

    /// Unique, monotonically assigned identifier for this transaction's
    /// writes. Doubles as a version stamp on everything it flushes.
    pub fn write_pointer(&self) -> u64 {
        self.write_pointer
    }

    /// Highest write pointer this transaction is allowed to see.
    pub fn read_pointer(&self) -> u64 {
        self.read_pointer
    }

    /// Write pointers the coordinator marked invisible to this transaction,
    /// such as concurrently in-flight or invalidated ones.
    pub fn excluded(&self) -> &BTreeSet<u64> {
        &self.excluded
    }

    /// Whether data written under `pointer` is visible to this transaction's
    /// reads.
    pub fn is_visible(&self, pointer: u64) -> bool {
        pointer <= self.read_pointer && !self.excluded.contains(&pointer)
    }
}
