//! Error types for the amp credit store.

use amp_credits_core::CreditError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
///
/// Domain failures (insufficient balance, unknown action, state conflicts)
/// surface as [`StoreError::Credit`] so callers keep the full taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A domain invariant rejected the operation.
    #[error(transparent)]
    Credit(#[from] CreditError),
}
