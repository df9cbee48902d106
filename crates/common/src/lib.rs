//! Common types for the strata queue engine
//!
//! This crate defines:
//! - The transaction handle issued by the coordinator
//! - The resource protocol every transactional participant implements

mod resource;
mod transaction;

pub use resource::{ProtocolError, ResourceState, TransactionalResource};
pub use transaction::Transaction;
