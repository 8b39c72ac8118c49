//! Fixed-size block cache over a [`BackingFile`].
//!
//! Blocks of `block_elements` elements are loaded on demand and evicted in
//! least-recently-used order. Dirty blocks are written back on eviction and on
//! [`BlockCache::flush`].

use std::collections::HashMap;

use crate::error::StorageError;
use crate::file::BackingFile;
use crate::stats::{AtomicCacheStats, CacheStats};

struct Block {
    data: Vec<u64>,
    dirty: bool,
    last_used: u64,
}

/// LRU cache of element blocks backed by a file.
pub struct BlockCache {
    file: Box<dyn BackingFile>,
    block_elements: usize,
    capacity: usize,
    len: usize,
    blocks: HashMap<usize, Block>,
    tick: u64,
    stats: AtomicCacheStats,
}

impl BlockCache {
    /// Create a cache of at most `capacity` blocks of `block_elements` elements.
    #[must_use]
    pub fn new(file: Box<dyn BackingFile>, block_elements: usize, capacity: usize) -> Self {
        Self {
            file,
            block_elements: block_elements.max(1),
            capacity: capacity.max(1),
            len: 0,
            blocks: HashMap::new(),
            tick: 0,
            stats: AtomicCacheStats::new(),
        }
    }

    /// Logical length in elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the cache covers no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks currently resident.
    #[must_use]
    pub fn resident_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Get a snapshot of cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Change the logical length. Elements past the old length read as zero.
    pub fn set_len(&mut self, len: usize) -> Result<(), StorageError> {
        self.flush()?;
        self.blocks.clear();
        self.file.set_len(byte_offset(len))?;
        self.len = len;
        Ok(())
    }

    /// Location of the backing file on disk, if it has been created.
    #[must_use]
    pub fn path(&self) -> Option<std::path::PathBuf> {
        self.file.path().map(std::path::Path::to_path_buf)
    }

    /// Let the backing file prepare for writes (creates scratch files).
    pub fn prepare_write(&mut self) -> Result<(), StorageError> {
        self.file.prepare_write()?;
        Ok(())
    }

    /// Copy `out.len()` elements starting at `position` into `out`.
    pub fn read(&mut self, position: usize, out: &mut [u64]) -> Result<(), StorageError> {
        StorageError::check_range(position, out.len(), self.len)?;
        let mut done = 0;
        while done < out.len() {
            let pos = position + done;
            let (index, within) = (pos / self.block_elements, pos % self.block_elements);
            let count = (self.block_elements - within).min(out.len() - done);
            let block = self.block_mut(index)?;
            out[done..done + count].copy_from_slice(&block.data[within..within + count]);
            done += count;
        }
        Ok(())
    }

    /// Copy `data` into the cache starting at `position`, marking blocks dirty.
    pub fn write(&mut self, position: usize, data: &[u64]) -> Result<(), StorageError> {
        StorageError::check_range(position, data.len(), self.len)?;
        let mut done = 0;
        while done < data.len() {
            let pos = position + done;
            let (index, within) = (pos / self.block_elements, pos % self.block_elements);
            let count = (self.block_elements - within).min(data.len() - done);
            let block = self.block_mut(index)?;
            block.data[within..within + count].copy_from_slice(&data[done..done + count]);
            block.dirty = true;
            done += count;
        }
        Ok(())
    }

    /// Write every dirty block back to the file.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let mut dirty: Vec<usize> = self
            .blocks
            .iter()
            .filter(|(_, b)| b.dirty)
            .map(|(&i, _)| i)
            .collect();
        dirty.sort_unstable();
        for index in dirty {
            if let Some(mut block) = self.blocks.remove(&index) {
                self.write_back(index, &block)?;
                block.dirty = false;
                self.blocks.insert(index, block);
            }
        }
        Ok(())
    }

    fn block_mut(&mut self, index: usize) -> Result<&mut Block, StorageError> {
        self.tick += 1;
        let tick = self.tick;
        if self.blocks.contains_key(&index) {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
            if self.blocks.len() >= self.capacity {
                self.evict_one()?;
            }
            let block = self.load(index)?;
            self.blocks.insert(index, block);
        }
        let block = self
            .blocks
            .get_mut(&index)
            .ok_or_else(|| StorageError::IllegalState(format!("block {index} not resident")))?;
        block.last_used = tick;
        Ok(block)
    }

    fn evict_one(&mut self) -> Result<(), StorageError> {
        let victim = self
            .blocks
            .iter()
            .min_by_key(|(_, b)| b.last_used)
            .map(|(&i, _)| i);
        if let Some(index) = victim {
            if let Some(block) = self.blocks.remove(&index) {
                if block.dirty {
                    self.write_back(index, &block)?;
                }
                self.stats.record_eviction();
                tracing::trace!(block = index, dirty = block.dirty, "evicted block");
            }
        }
        Ok(())
    }

    fn load(&mut self, index: usize) -> Result<Block, StorageError> {
        let mut bytes = vec![0u8; self.block_elements * 8];
        self.file
            .read_at(byte_offset(index * self.block_elements), &mut bytes)?;
        let data = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_ne_bytes(word)
            })
            .collect();
        Ok(Block {
            data,
            dirty: false,
            last_used: self.tick,
        })
    }

    fn write_back(&mut self, index: usize, block: &Block) -> Result<(), StorageError> {
        let start = index * self.block_elements;
        let count = self.len.saturating_sub(start).min(self.block_elements);
        if count == 0 {
            return Ok(());
        }
        let bytes: Vec<u8> = block.data[..count]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        self.file.write_at(byte_offset(start), &bytes)?;
        self.stats.record_flush();
        Ok(())
    }
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("block_elements", &self.block_elements)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("resident", &self.blocks.len())
            .finish_non_exhaustive()
    }
}

fn byte_offset(elements: usize) -> u64 {
    (elements as u64) * 8
}
