//! Transform settings.

use serde::{Deserialize, Serialize};

use ntmul_storage::MAX_STORAGE_LEN;

/// Default L1 data cache size (32 KiB).
pub const DEFAULT_CACHE_L1_BYTES: usize = 32 << 10;

/// Default transpose tile edge in bytes.
pub const DEFAULT_CACHE_BURST_BYTES: usize = 256;

/// Default largest block processed in memory at once (64 MiB).
pub const DEFAULT_MAX_MEMORY_BLOCK_BYTES: usize = 64 << 20;

/// Settings that drive strategy selection and blocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NttConfig {
    /// L1 data cache size; lengths up to half of it use the table transform.
    pub cache_l1_bytes: usize,
    /// Tile edge of the blocked matrix transpose.
    pub cache_burst_bytes: usize,
    /// Largest block held in memory by the six-step and two-pass transforms.
    pub max_memory_block_bytes: usize,
    /// Largest number of elements in one in-memory array.
    pub max_array_len: usize,
}

impl Default for NttConfig {
    fn default() -> Self {
        Self {
            cache_l1_bytes: DEFAULT_CACHE_L1_BYTES,
            cache_burst_bytes: DEFAULT_CACHE_BURST_BYTES,
            max_memory_block_bytes: DEFAULT_MAX_MEMORY_BLOCK_BYTES,
            max_array_len: MAX_STORAGE_LEN,
        }
    }
}

impl NttConfig {
    /// L1 cache size in elements.
    #[must_use]
    pub fn cache_elements(&self) -> usize {
        self.cache_l1_bytes / 8
    }

    /// Transpose tile edge in elements (at least one).
    #[must_use]
    pub fn burst_elements(&self) -> usize {
        (self.cache_burst_bytes / 8).max(1)
    }

    /// Largest in-memory block in elements (at least one).
    #[must_use]
    pub fn max_block_elements(&self) -> usize {
        (self.max_memory_block_bytes / 8).max(1)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cache_l1_bytes.is_power_of_two() {
            return Err(format!(
                "L1 cache size must be a power of two, got {}",
                self.cache_l1_bytes
            ));
        }
        if !self.cache_burst_bytes.is_power_of_two() || self.cache_burst_bytes < 8 {
            return Err(format!(
                "cache burst must be a power of two of at least 8 bytes, got {}",
                self.cache_burst_bytes
            ));
        }
        if !self.max_memory_block_bytes.is_power_of_two() {
            return Err(format!(
                "max memory block must be a power of two, got {}",
                self.max_memory_block_bytes
            ));
        }
        if self.max_memory_block_bytes < self.cache_burst_bytes {
            return Err("max memory block must not be smaller than the cache burst".into());
        }
        if self.max_array_len == 0 {
            return Err("max array length must be positive".into());
        }
        Ok(())
    }
}
