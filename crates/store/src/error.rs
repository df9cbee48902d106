//! Error types for the table store boundary

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in a table store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
