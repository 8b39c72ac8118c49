//! Storage settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default size above which scratch storage goes to disk (256 MiB).
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: usize = 256 << 20;

/// Default disk block size (64 KiB).
pub const DEFAULT_BLOCK_SIZE_BYTES: usize = 64 << 10;

/// Default number of resident blocks per disk storage.
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

/// Settings read once when a [`StorageFactory`](crate::StorageFactory) is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storages larger than this many bytes are created on disk.
    pub memory_threshold_bytes: usize,
    /// Size of one block of the disk block cache.
    pub block_size_bytes: usize,
    /// Number of blocks kept resident per disk storage.
    pub cache_blocks: usize,
    /// Directory for scratch files; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
            temp_dir: None,
        }
    }
}

impl StorageConfig {
    /// Number of `u64` elements per disk block (at least one).
    #[must_use]
    pub fn block_elements(&self) -> usize {
        (self.block_size_bytes / 8).max(1)
    }

    /// Largest number of elements kept in a memory storage.
    #[must_use]
    pub fn memory_threshold_elements(&self) -> usize {
        self.memory_threshold_bytes / 8
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size_bytes < 8 {
            return Err(format!(
                "block size must hold at least one element, got {} bytes",
                self.block_size_bytes
            ));
        }
        if self.cache_blocks == 0 {
            return Err("cache must hold at least one block".to_string());
        }
        Ok(())
    }
}
