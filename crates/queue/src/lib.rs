//! Transactional queue engine
//!
//! Producers buffer entries client-side and flush them under their
//! transaction's write pointer at commit; consumers read the write-pointer-
//! ordered, tombstone-filtered view and advance a durable progress marker at
//! commit. All-or-nothing visibility comes from the transaction handles the
//! coordinator issues plus tombstone undo, not from in-process locking, so
//! the guarantees hold across process boundaries.

pub mod admin;
pub mod consumer;
pub mod entry;
pub mod entry_store;
mod error;
mod keys;
pub mod producer;
pub mod registry;

pub use admin::{QueueAdmin, QueueConfig};
pub use consumer::{ConsumerGroup, Partitioning, QueueConsumer};
pub use entry::{EntryPointer, EntryRecord, EntryState, QueueEntry, QueueName};
pub use entry_store::EntryStore;
pub use error::{QueueError, Result};
pub use producer::QueueProducer;
pub use registry::QueueRegistry;
