//! Storage error type.

/// Errors raised by element storages and their accesses.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested length does not fit in an addressable array.
    #[error("capacity exceeded: requested {requested} elements, limit is {limit}")]
    CapacityExceeded {
        /// Requested number of elements.
        requested: usize,
        /// Largest supported number of elements.
        limit: usize,
    },

    /// A mutating operation was attempted on a read-only storage.
    #[error("illegal access: {0}")]
    IllegalAccess(String),

    /// The operation is not valid in the current state (closed access, wrong mode).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A window or subsequence does not lie inside its storage.
    #[error("range out of bounds: offset {offset} + length {length} exceeds {limit}")]
    OutOfRange {
        /// Start of the requested range.
        offset: usize,
        /// Length of the requested range.
        length: usize,
        /// Length of the storage the range was taken from.
        limit: usize,
    },

    /// The scratch file could not be read or written.
    #[error("scratch file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Check that `offset..offset + length` lies inside `0..limit`.
    pub fn check_range(offset: usize, length: usize, limit: usize) -> Result<(), Self> {
        match offset.checked_add(length) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(Self::OutOfRange {
                offset,
                length,
                limit,
            }),
        }
    }
}
