//! Error types for the round store.

use thiserror::Error;

/// Result type alias for round store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by the round store and its gateway.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open round database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("failed to encode round record: {0}")]
    Serialize(String),

    #[error("failed to decode round record: {0}")]
    Deserialize(String),

    #[error("round not found: {0}")]
    NotFound(String),
}

impl StateError {
    /// Whether the error refers to a missing round rather than a storage fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}
