//! Engine settings: storage, transform and reconstruction parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use ntmul_ntt::NttConfig;
use ntmul_storage::StorageConfig;

use crate::error::EngineError;

/// Default number of coefficients per carry-CRT block.
pub const DEFAULT_CRT_BLOCK_ELEMENTS: usize = 1 << 16;

/// Default longest shorter operand multiplied without transforms.
pub const DEFAULT_SCHOOLBOOK_ELEMENTS: usize = 8;

/// Smallest default in-memory transform block (1 MiB).
pub const MIN_DEFAULT_MEMORY_BLOCK: usize = 1 << 20;

/// Largest default in-memory transform block (1 GiB).
pub const MAX_DEFAULT_MEMORY_BLOCK: usize = 1 << 30;

/// All settings of one engine instance, read once when the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scratch storage settings.
    pub storage: StorageConfig,
    /// Transform strategy settings.
    pub ntt: NttConfig,
    /// Coefficients reconstructed per carry-CRT block.
    pub crt_block_elements: usize,
    /// Products whose shorter operand has at most this many elements are
    /// computed by schoolbook multiplication.
    pub schoolbook_max_elements: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            ntt: NttConfig::default(),
            crt_block_elements: DEFAULT_CRT_BLOCK_ELEMENTS,
            schoolbook_max_elements: DEFAULT_SCHOOLBOOK_ELEMENTS,
        }
    }
}

impl EngineConfig {
    /// Defaults sized to this machine's memory.
    #[must_use]
    pub fn detect() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let total = usize::try_from(sys.total_memory()).unwrap_or(usize::MAX);
        let mut config = Self::default();
        config.ntt.max_memory_block_bytes = memory_block_for(total);
        config.storage.memory_threshold_bytes =
            config.storage.memory_threshold_bytes.max(config.ntt.max_memory_block_bytes);
        tracing::debug!(
            total_memory = total,
            max_memory_block = config.ntt.max_memory_block_bytes,
            "detected engine defaults"
        );
        config
    }

    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.storage.validate().map_err(EngineError::configuration)?;
        self.ntt.validate().map_err(EngineError::configuration)?;
        if self.crt_block_elements == 0 {
            return Err(EngineError::configuration(
                "carry-CRT block must hold at least one element",
            ));
        }
        Ok(())
    }
}

/// Largest power of two not above an eighth of `total_memory`, clamped to
/// [`MIN_DEFAULT_MEMORY_BLOCK`, `MAX_DEFAULT_MEMORY_BLOCK`].
#[must_use]
pub fn memory_block_for(total_memory: usize) -> usize {
    let eighth = total_memory / 8;
    if eighth < MIN_DEFAULT_MEMORY_BLOCK {
        return MIN_DEFAULT_MEMORY_BLOCK;
    }
    (1usize << eighth.ilog2()).min(MAX_DEFAULT_MEMORY_BLOCK)
}

/// Parse a byte size such as "64M", "1G", "512K" or "4096".
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size".into());
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1usize << 30)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1 << 20)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1 << 10)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s, 1)
    };

    let value: usize = num_str
        .trim()
        .parse()
        .map_err(|e| format!("invalid size {s:?}: {e}"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size {s:?} overflows"))
}
