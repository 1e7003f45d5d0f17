//! Component engine error types.

use thiserror::Error;

use super::slot::SlotKeyError;
use crate::storage::DatabaseError;

/// Errors raised by component lifecycle and wear operations.
///
/// Records owned by another user are reported as `NotFound`, exactly as if
/// they did not exist.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Referenced bike, component or slot does not exist for this user.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is malformed or contradicts the current state.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A concurrent write claimed the same slot or type.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for ComponentError {
    fn from(err: rusqlite::Error) -> Self {
        ComponentError::Database(err.into())
    }
}

impl From<SlotKeyError> for ComponentError {
    fn from(err: SlotKeyError) -> Self {
        ComponentError::InvalidInput(err.to_string())
    }
}

/// Result type for component operations.
pub type ComponentResult<T> = Result<T, ComponentError>;
