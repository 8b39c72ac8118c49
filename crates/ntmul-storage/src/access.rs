//! Windowed access to element storage.
//!
//! An [`ArrayAccess`] is a scoped lease on a contiguous window of one storage.
//! Memory storages hand out the backing slice under a lock; disk storages and
//! transposed windows hand out a staging copy that is written back when the
//! access is closed. Disk write-backs land in the block cache; the file sees
//! them on eviction or [`DataStorage::flush`]. A [`JointAccess`] stages windows of three storages in one
//! contiguous buffer and splits it into three disjoint views.

use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock};

use crate::block_cache::BlockCache;
use crate::error::StorageError;
use crate::storage::DataStorage;

/// Read/write mode of an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Elements may be read but not modified.
    Read,
    /// Elements may be written; their prior contents are not loaded.
    Write,
    /// Elements are loaded and may be modified.
    ReadWrite,
}

impl AccessMode {
    /// Check if the mode allows reading.
    #[must_use]
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Check if the mode allows writing.
    #[must_use]
    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

enum Lease {
    Read {
        guard: ArcRwLockReadGuard<RawRwLock, Vec<u64>>,
        start: usize,
    },
    Write {
        guard: ArcRwLockWriteGuard<RawRwLock, Vec<u64>>,
        start: usize,
    },
    Staged {
        buffer: Vec<u64>,
        target: Target,
    },
}

enum Target {
    Disk {
        cache: Arc<Mutex<BlockCache>>,
        position: usize,
    },
    Transposed {
        storage: DataStorage,
        start_col: usize,
        cols: usize,
        rows: usize,
        width: usize,
    },
}

/// A scoped lease on `len` consecutive elements of a storage.
///
/// Closing is idempotent; dropping an open access closes it.
pub struct ArrayAccess {
    mode: AccessMode,
    len: usize,
    lease: Option<Lease>,
}

impl ArrayAccess {
    pub(crate) fn memory_read(
        guard: ArcRwLockReadGuard<RawRwLock, Vec<u64>>,
        start: usize,
        len: usize,
    ) -> Self {
        Self {
            mode: AccessMode::Read,
            len,
            lease: Some(Lease::Read { guard, start }),
        }
    }

    pub(crate) fn memory_write(
        mode: AccessMode,
        guard: ArcRwLockWriteGuard<RawRwLock, Vec<u64>>,
        start: usize,
        len: usize,
    ) -> Self {
        Self {
            mode,
            len,
            lease: Some(Lease::Write { guard, start }),
        }
    }

    pub(crate) fn disk(
        mode: AccessMode,
        buffer: Vec<u64>,
        cache: Arc<Mutex<BlockCache>>,
        position: usize,
    ) -> Self {
        Self {
            mode,
            len: buffer.len(),
            lease: Some(Lease::Staged {
                buffer,
                target: Target::Disk { cache, position },
            }),
        }
    }

    pub(crate) fn transposed(
        mode: AccessMode,
        buffer: Vec<u64>,
        storage: DataStorage,
        start_col: usize,
        cols: usize,
        rows: usize,
        width: usize,
    ) -> Self {
        Self {
            mode,
            len: buffer.len(),
            lease: Some(Lease::Staged {
                buffer,
                target: Target::Transposed {
                    storage,
                    start_col,
                    cols,
                    rows,
                    width,
                },
            }),
        }
    }

    /// Mode this access was opened with.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Number of elements in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the access has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lease.is_none()
    }

    /// The window's elements.
    pub fn data(&self) -> Result<&[u64], StorageError> {
        if !self.mode.can_read() {
            return Err(StorageError::IllegalState(
                "read through a write-only access".into(),
            ));
        }
        self.slice()
    }

    /// The window's elements, for modification.
    pub fn data_mut(&mut self) -> Result<&mut [u64], StorageError> {
        if !self.mode.can_write() {
            return Err(StorageError::IllegalState(
                "write through a read-only access".into(),
            ));
        }
        let len = self.len;
        match self.lease.as_mut() {
            None => Err(closed()),
            Some(Lease::Read { .. }) => Err(StorageError::IllegalState(
                "write through a read lease".into(),
            )),
            Some(Lease::Write { guard, start }) => Ok(&mut guard[*start..*start + len]),
            Some(Lease::Staged { buffer, .. }) => Ok(buffer.as_mut_slice()),
        }
    }

    /// Element at `index` within the window.
    pub fn get(&self, index: usize) -> Result<u64, StorageError> {
        StorageError::check_range(index, 1, self.len)?;
        Ok(self.data()?[index])
    }

    /// Set the element at `index` within the window.
    pub fn set(&mut self, index: usize, value: u64) -> Result<(), StorageError> {
        StorageError::check_range(index, 1, self.len)?;
        self.data_mut()?[index] = value;
        Ok(())
    }

    /// Release the lease, persisting staged data of write-mode accesses.
    pub fn close(&mut self) -> Result<(), StorageError> {
        let Some(lease) = self.lease.take() else {
            return Ok(());
        };
        match lease {
            Lease::Read { .. } | Lease::Write { .. } => Ok(()),
            Lease::Staged { buffer, target } => {
                if !self.mode.can_write() {
                    return Ok(());
                }
                match target {
                    Target::Disk { cache, position } => cache.lock().write(position, &buffer),
                    Target::Transposed {
                        storage,
                        start_col,
                        cols,
                        rows,
                        width,
                    } => {
                        let mut row = vec![0; cols];
                        for r in 0..rows {
                            for (c, value) in row.iter_mut().enumerate() {
                                *value = buffer[c * rows + r];
                            }
                            storage.write_from(r * width + start_col, &row)?;
                        }
                        Ok(())
                    }
                }
            }
        }
    }

    fn slice(&self) -> Result<&[u64], StorageError> {
        match self.lease.as_ref() {
            None => Err(closed()),
            Some(Lease::Read { guard, start }) => Ok(&guard[*start..*start + self.len]),
            Some(Lease::Write { guard, start }) => Ok(&guard[*start..*start + self.len]),
            Some(Lease::Staged { buffer, .. }) => Ok(buffer.as_slice()),
        }
    }
}

impl Drop for ArrayAccess {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close array access");
        }
    }
}

impl std::fmt::Debug for ArrayAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayAccess")
            .field("mode", &self.mode)
            .field("len", &self.len)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Windows of three storages staged in one contiguous buffer.
///
/// The three views are always disjoint and adjacent, so row-local algorithms
/// can walk them together without any runtime layout check.
pub struct JointAccess {
    mode: AccessMode,
    len: usize,
    buffer: Vec<u64>,
    targets: Option<[(DataStorage, usize); 3]>,
}

impl JointAccess {
    /// Stage `len` elements starting at `offset` of each of the three storages.
    pub fn new(
        mode: AccessMode,
        storages: [&DataStorage; 3],
        offset: usize,
        len: usize,
    ) -> Result<Self, StorageError> {
        let mut buffer = vec![0; 3 * len];
        for (i, storage) in storages.iter().enumerate() {
            if mode.can_write() && storage.is_read_only() {
                return Err(StorageError::IllegalAccess(
                    "joint write access over a read-only storage".into(),
                ));
            }
            StorageError::check_range(offset, len, storage.len())?;
            if mode.can_read() {
                storage.read_into(offset, &mut buffer[i * len..(i + 1) * len])?;
            }
        }
        Ok(Self {
            mode,
            len,
            buffer,
            targets: Some(storages.map(|s| (s.share(), offset))),
        })
    }

    /// Number of elements in each view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the views are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The three views, for modification.
    pub fn views_mut(&mut self) -> Result<[&mut [u64]; 3], StorageError> {
        if self.targets.is_none() {
            return Err(closed());
        }
        if !self.mode.can_write() {
            return Err(StorageError::IllegalState(
                "write through a read-only joint access".into(),
            ));
        }
        let (first, rest) = self.buffer.split_at_mut(self.len);
        let (second, third) = rest.split_at_mut(self.len);
        Ok([first, second, third])
    }

    /// The three views.
    pub fn views(&self) -> Result<[&[u64]; 3], StorageError> {
        if self.targets.is_none() {
            return Err(closed());
        }
        if !self.mode.can_read() {
            return Err(StorageError::IllegalState(
                "read through a write-only joint access".into(),
            ));
        }
        let (first, rest) = self.buffer.split_at(self.len);
        let (second, third) = rest.split_at(self.len);
        Ok([first, second, third])
    }

    /// Write the views back (for write modes) and release the storages.
    pub fn close(&mut self) -> Result<(), StorageError> {
        let Some(targets) = self.targets.take() else {
            return Ok(());
        };
        if self.mode.can_write() && self.len > 0 {
            for ((storage, offset), chunk) in targets.iter().zip(self.buffer.chunks(self.len)) {
                storage.write_from(*offset, chunk)?;
            }
        }
        Ok(())
    }
}

impl Drop for JointAccess {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close joint access");
        }
    }
}

fn closed() -> StorageError {
    StorageError::IllegalState("access already closed".into())
}
