//! Creates scratch storages according to a [`StorageConfig`].

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::file::ScratchFile;
use crate::storage::DataStorage;

/// Creates memory or disk storages depending on their size.
#[derive(Debug, Clone, Default)]
pub struct StorageFactory {
    config: StorageConfig,
}

impl StorageFactory {
    /// Create a factory with the given settings.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Settings this factory was built with.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Check if a storage of `len` elements would be created on disk.
    #[must_use]
    pub fn uses_disk(&self, len: usize) -> bool {
        len > self.config.memory_threshold_elements()
    }

    /// Create a zeroed storage of `len` elements.
    pub fn create(&self, len: usize) -> Result<DataStorage, StorageError> {
        if self.uses_disk(len) {
            self.create_disk(len)
        } else {
            DataStorage::memory(len)
        }
    }

    /// Create a zeroed disk storage regardless of size.
    pub fn create_disk(&self, len: usize) -> Result<DataStorage, StorageError> {
        tracing::debug!(elements = len, "creating disk storage");
        let file = ScratchFile::new(self.config.temp_dir.clone());
        DataStorage::disk(len, Box::new(file), &self.config)
    }
}
