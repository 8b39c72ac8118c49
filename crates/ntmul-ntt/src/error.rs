//! Transform error type.

use ntmul_storage::StorageError;

/// Errors raised while planning, transforming or reconstructing.
#[derive(Debug, thiserror::Error)]
pub enum NttError {
    /// The underlying storage refused an operation.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The transform length exceeds what the modulus set supports.
    #[error("transform length {requested} exceeds the maximum of {limit}")]
    Capacity {
        /// Requested length.
        requested: usize,
        /// Largest supported length.
        limit: usize,
    },

    /// Invalid settings or an unsupported length/base combination.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An invariant that correct code always maintains was violated.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}
