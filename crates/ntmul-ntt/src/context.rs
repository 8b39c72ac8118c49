//! Immutable transform context: the modulus set and a shared root-table cache.
//!
//! One context is built per engine and shared by reference (`Arc`) with every
//! strategy. The moduli never change; root tables are computed on first use and
//! then only read.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use ntmul_storage::stats::{AtomicCacheStats, CacheStats};

use crate::error::NttError;
use crate::modmath::{Modulus, MODULUS_COUNT};

/// Cache key for root tables.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct TableKey {
    /// Index into the modulus set.
    pub modulus: usize,
    /// Transform length the roots belong to.
    pub length: usize,
    /// Whether the table holds inverse roots.
    pub inverse: bool,
}

/// Thread-safe cache of root-of-unity tables.
///
/// A table for length `n` holds `w^k` for `k < n/2` in Montgomery form.
pub struct RootTableCache {
    cache: Mutex<HashMap<TableKey, Arc<[u64]>>>,
    max_entries: usize,
    stats: AtomicCacheStats,
}

impl RootTableCache {
    /// Create a new cache with the given maximum entries.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            stats: AtomicCacheStats::new(),
        }
    }

    /// Get a cached table, if available.
    pub fn get(&self, key: &TableKey) -> Option<Arc<[u64]>> {
        self.cache.lock().get(key).cloned()
    }

    /// Get the table for `key`, computing it with `modulus` on a miss.
    pub fn get_or_compute(&self, key: TableKey, modulus: &Modulus) -> Result<Arc<[u64]>, NttError> {
        if let Some(table) = self.get(&key) {
            self.stats.record_hit();
            return Ok(table);
        }
        self.stats.record_miss();
        let table: Arc<[u64]> = compute_table(modulus, key.length, key.inverse)?.into();
        let mut cache = self.cache.lock();
        if cache.len() >= self.max_entries && !cache.contains_key(&key) {
            // Simple eviction: clear everything and start over
            for _ in 0..cache.len() {
                self.stats.record_eviction();
            }
            cache.clear();
        }
        Ok(Arc::clone(cache.entry(key).or_insert(table)))
    }

    /// Get the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Clear the cache.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Get a snapshot of cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

impl Default for RootTableCache {
    fn default() -> Self {
        Self::new(64)
    }
}

fn compute_table(modulus: &Modulus, length: usize, inverse: bool) -> Result<Vec<u64>, NttError> {
    let root = if inverse {
        modulus.inverse_root(length)
    } else {
        modulus.forward_root(length)
    }
    .ok_or_else(|| {
        NttError::Configuration(format!(
            "no root of unity of order {length} modulo {}",
            modulus.value()
        ))
    })?;
    let root = modulus.to_montgomery(root);
    let mut table = Vec::with_capacity(length / 2);
    let mut w = modulus.to_montgomery(1);
    for _ in 0..length / 2 {
        table.push(w);
        w = modulus.mul_montgomery(w, root);
    }
    Ok(table)
}

/// The modulus set plus shared root tables.
pub struct NttContext {
    moduli: [Modulus; MODULUS_COUNT],
    tables: RootTableCache,
}

impl NttContext {
    /// Create a context caching at most `max_tables` root tables.
    #[must_use]
    pub fn new(max_tables: usize) -> Self {
        Self {
            moduli: [Modulus::of_set(0), Modulus::of_set(1), Modulus::of_set(2)],
            tables: RootTableCache::new(max_tables),
        }
    }

    /// The `index`-th modulus.
    pub fn modulus(&self, index: usize) -> Result<&Modulus, NttError> {
        self.moduli.get(index).ok_or_else(|| {
            NttError::Configuration(format!(
                "modulus index {index} out of range (0..{MODULUS_COUNT})"
            ))
        })
    }

    /// All moduli of the set.
    #[must_use]
    pub fn moduli(&self) -> &[Modulus; MODULUS_COUNT] {
        &self.moduli
    }

    /// Root table (Montgomery form) for a row transform of `length` elements.
    pub fn roots(&self, modulus: usize, length: usize, inverse: bool) -> Result<Arc<[u64]>, NttError> {
        let m = self.modulus(modulus)?;
        self.tables.get_or_compute(
            TableKey {
                modulus,
                length,
                inverse,
            },
            m,
        )
    }

    /// The root-table cache.
    #[must_use]
    pub fn tables(&self) -> &RootTableCache {
        &self.tables
    }
}

impl Default for NttContext {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for NttContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NttContext")
            .field("moduli", &self.moduli)
            .field("cached_tables", &self.tables.len())
            .finish()
    }
}
