//! Transaction coordination for the queue engine
//!
//! The engine consumes a narrow coordinator boundary: begin a transaction,
//! ask whether a conflict set may commit, finalize, or abort. Conflict
//! arbitration lives behind that boundary, not in the engine. This crate
//! defines the boundary, an in-process implementation of it, and a driver
//! that walks a set of participants through one unit of work.

mod context;
mod coordinator;

pub use context::{ContextError, TransactionContext};
pub use coordinator::{LocalCoordinator, TransactionCoordinator};
