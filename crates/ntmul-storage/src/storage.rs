//! Element storage: a sequence of `u64` elements in memory or on disk.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::access::{AccessMode, ArrayAccess};
use crate::block_cache::BlockCache;
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::file::BackingFile;
use crate::stats::CacheStats;

/// Largest number of elements a storage may hold (the addressable byte limit / 8).
pub const MAX_STORAGE_LEN: usize = isize::MAX as usize / 8;

/// Elements moved per step by [`DataStorage::copy_from`].
const COPY_BUFFER_ELEMENTS: usize = 1 << 16;

#[derive(Clone)]
pub(crate) enum Backing {
    Memory(Arc<RwLock<Vec<u64>>>),
    Disk(Arc<Mutex<BlockCache>>),
}

/// A sequence of elements, or a subsequence view sharing another storage's data.
///
/// Views created with [`subsequence`](Self::subsequence) and
/// [`read_only`](Self::read_only) share the backing elements; the backing is
/// released when the last view is dropped. A disk backing deletes its scratch
/// file at that point.
pub struct DataStorage {
    backing: Backing,
    offset: usize,
    len: usize,
    read_only: bool,
    subsequence: bool,
}

impl DataStorage {
    /// Create a zeroed in-memory storage.
    pub fn memory(len: usize) -> Result<Self, StorageError> {
        check_capacity(len)?;
        Ok(Self::from_backing(
            Backing::Memory(Arc::new(RwLock::new(vec![0; len]))),
            len,
        ))
    }

    /// Wrap existing elements in an in-memory storage.
    pub fn from_vec(data: Vec<u64>) -> Result<Self, StorageError> {
        check_capacity(data.len())?;
        let len = data.len();
        Ok(Self::from_backing(
            Backing::Memory(Arc::new(RwLock::new(data))),
            len,
        ))
    }

    /// Create a zeroed disk storage over `file`, cached per `config`.
    pub fn disk(
        len: usize,
        file: Box<dyn BackingFile>,
        config: &StorageConfig,
    ) -> Result<Self, StorageError> {
        check_capacity(len)?;
        let mut cache = BlockCache::new(file, config.block_elements(), config.cache_blocks);
        cache.set_len(len)?;
        Ok(Self::from_backing(
            Backing::Disk(Arc::new(Mutex::new(cache))),
            len,
        ))
    }

    fn from_backing(backing: Backing, len: usize) -> Self {
        Self {
            backing,
            offset: 0,
            len,
            read_only: false,
            subsequence: false,
        }
    }

    /// Another handle onto the same elements and range.
    pub(crate) fn share(&self) -> Self {
        Self {
            backing: self.backing.clone(),
            offset: self.offset,
            len: self.len,
            read_only: self.read_only,
            subsequence: self.subsequence,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the storage holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if mutating accesses are refused.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Check if this is a view onto part of another storage.
    #[must_use]
    pub fn is_subsequence(&self) -> bool {
        self.subsequence
    }

    /// Check if the elements live in a disk block cache.
    #[must_use]
    pub fn is_disk(&self) -> bool {
        matches!(self.backing, Backing::Disk(_))
    }

    /// Path of the scratch file, once a write access has created it.
    #[must_use]
    pub fn scratch_path(&self) -> Option<PathBuf> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::Disk(cache) => cache.lock().path(),
        }
    }

    /// Block cache statistics of a disk storage.
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::Disk(cache) => Some(cache.lock().stats()),
        }
    }

    /// Change the number of elements; new elements are zero.
    ///
    /// Only legal on a writable storage that is not a subsequence.
    pub fn resize(&mut self, len: usize) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::IllegalAccess(
                "cannot resize a read-only storage".into(),
            ));
        }
        if self.subsequence {
            return Err(StorageError::IllegalState(
                "cannot resize a subsequence".into(),
            ));
        }
        check_capacity(len)?;
        match &self.backing {
            Backing::Memory(data) => data.write().resize(len, 0),
            Backing::Disk(cache) => cache.lock().set_len(len)?,
        }
        self.len = len;
        Ok(())
    }

    /// A view of `len` elements starting at `offset`, sharing this storage's data.
    pub fn subsequence(&self, offset: usize, len: usize) -> Result<Self, StorageError> {
        StorageError::check_range(offset, len, self.len)?;
        Ok(Self {
            backing: self.backing.clone(),
            offset: self.offset + offset,
            len,
            read_only: self.read_only,
            subsequence: true,
        })
    }

    /// A read-only view of the whole storage.
    #[must_use]
    pub fn read_only(&self) -> Self {
        Self {
            read_only: true,
            ..self.share()
        }
    }

    /// Lease the window `offset..offset + len`.
    ///
    /// The lease is exclusive for write modes. Memory accesses lock the backing
    /// for their lifetime, so a thread must close one access before opening an
    /// overlapping one on the same storage.
    pub fn access(
        &self,
        mode: AccessMode,
        offset: usize,
        len: usize,
    ) -> Result<ArrayAccess, StorageError> {
        self.check_mode(mode)?;
        StorageError::check_range(offset, len, self.len)?;
        let start = self.offset + offset;
        match &self.backing {
            Backing::Memory(data) => {
                if mode.can_write() {
                    let guard = data.write_arc();
                    StorageError::check_range(start, len, guard.len())?;
                    Ok(ArrayAccess::memory_write(mode, guard, start, len))
                } else {
                    let guard = data.read_arc();
                    StorageError::check_range(start, len, guard.len())?;
                    Ok(ArrayAccess::memory_read(guard, start, len))
                }
            }
            Backing::Disk(cache) => {
                let mut buffer = vec![0; len];
                {
                    let mut cache = cache.lock();
                    if mode.can_write() {
                        cache.prepare_write()?;
                    }
                    if mode.can_read() {
                        cache.read(start, &mut buffer)?;
                    }
                }
                Ok(ArrayAccess::disk(mode, buffer, Arc::clone(cache), start))
            }
        }
    }

    /// Lease `cols` columns starting at `start_col` of this storage viewed as a
    /// `rows`-row matrix, presented transposed: column `c` becomes the
    /// contiguous row `c` of `rows` elements in the access.
    pub fn transposed_access(
        &self,
        mode: AccessMode,
        start_col: usize,
        cols: usize,
        rows: usize,
    ) -> Result<ArrayAccess, StorageError> {
        self.check_mode(mode)?;
        if rows == 0 || self.len % rows != 0 {
            return Err(StorageError::IllegalState(format!(
                "{} elements do not form {rows} rows",
                self.len
            )));
        }
        let width = self.len / rows;
        StorageError::check_range(start_col, cols, width)?;
        let mut buffer = vec![0; cols * rows];
        if mode.can_read() {
            let mut row = vec![0; cols];
            for r in 0..rows {
                self.read_into(r * width + start_col, &mut row)?;
                for (c, &value) in row.iter().enumerate() {
                    buffer[c * rows + r] = value;
                }
            }
        }
        Ok(ArrayAccess::transposed(
            mode,
            buffer,
            self.share(),
            start_col,
            cols,
            rows,
            width,
        ))
    }

    /// Copy `out.len()` elements starting at `offset` into `out`.
    pub fn read_into(&self, offset: usize, out: &mut [u64]) -> Result<(), StorageError> {
        let access = self.access(AccessMode::Read, offset, out.len())?;
        out.copy_from_slice(access.data()?);
        Ok(())
    }

    /// Overwrite the elements starting at `offset` with `data`.
    pub fn write_from(&self, offset: usize, data: &[u64]) -> Result<(), StorageError> {
        let mut access = self.access(AccessMode::Write, offset, data.len())?;
        access.data_mut()?.copy_from_slice(data);
        access.close()
    }

    /// All elements as a vector.
    pub fn to_vec(&self) -> Result<Vec<u64>, StorageError> {
        let mut out = vec![0; self.len];
        self.read_into(0, &mut out)?;
        Ok(out)
    }

    /// Copy the first `size` elements of `source` into the first `size` elements
    /// of this storage, through a bounded buffer.
    pub fn copy_from(&self, source: &DataStorage, size: usize) -> Result<(), StorageError> {
        StorageError::check_range(0, size, source.len)?;
        StorageError::check_range(0, size, self.len)?;
        let mut buffer = vec![0; COPY_BUFFER_ELEMENTS.min(size)];
        let mut done = 0;
        while done < size {
            let count = buffer.len().min(size - done);
            source.read_into(done, &mut buffer[..count])?;
            self.write_from(done, &buffer[..count])?;
            done += count;
        }
        Ok(())
    }

    /// Write cached dirty blocks of a disk storage to its file.
    pub fn flush(&self) -> Result<(), StorageError> {
        match &self.backing {
            Backing::Memory(_) => Ok(()),
            Backing::Disk(cache) => cache.lock().flush(),
        }
    }

    fn check_mode(&self, mode: AccessMode) -> Result<(), StorageError> {
        if mode.can_write() && self.read_only {
            return Err(StorageError::IllegalAccess(format!(
                "{mode:?} access requested on a read-only storage"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DataStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStorage")
            .field("disk", &self.is_disk())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("read_only", &self.read_only)
            .field("subsequence", &self.subsequence)
            .finish()
    }
}

fn check_capacity(len: usize) -> Result<(), StorageError> {
    if len > MAX_STORAGE_LEN {
        return Err(StorageError::CapacityExceeded {
            requested: len,
            limit: MAX_STORAGE_LEN,
        });
    }
    Ok(())
}
