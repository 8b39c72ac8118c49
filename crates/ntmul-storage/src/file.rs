//! Backing files for disk storage.
//!
//! The on-disk layout is a flat run of native-endian `u64` elements addressed by
//! `position * 8`; there is no header. Reads past the end of the file yield zeros.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Byte-addressed random-access file used under a [`BlockCache`](crate::block_cache::BlockCache).
pub trait BackingFile: Send {
    /// Fill `buf` from byte `offset`; bytes past the end read as zero.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Write `buf` at byte `offset`, growing the file if needed.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Truncate or extend the file to `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Called before the first write-mode access is handed out.
    fn prepare_write(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Location on disk, if the file has one.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// In-memory stand-in for a file, for tests and small scratch storages.
#[derive(Debug, Default)]
pub struct MemFile {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemFile {
    /// Create an empty in-memory file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of `write_at` calls seen so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

#[allow(clippy::cast_possible_truncation)]
impl BackingFile for MemFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = (offset as usize).min(self.bytes.len());
        let end = (start + buf.len()).min(self.bytes.len());
        let available = end - start;
        buf[..available].copy_from_slice(&self.bytes[start..end]);
        buf[available..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(buf);
        self.writes += 1;
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.bytes.resize(len as usize, 0);
        Ok(())
    }
}

/// Temporary file created on first write and deleted when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    dir: Option<PathBuf>,
    file: Option<NamedTempFile>,
    len: u64,
}

impl ScratchFile {
    /// Create a scratch file handle; nothing is created on disk yet.
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            file: None,
            len: 0,
        }
    }

    fn ensure_created(&mut self) -> io::Result<&mut NamedTempFile> {
        if self.file.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("ntmul-").suffix(".scratch");
            let file = match &self.dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            file.as_file().set_len(self.len)?;
            tracing::debug!(path = %file.path().display(), bytes = self.len, "created scratch file");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("scratch file missing after creation"))
    }
}

impl BackingFile for ScratchFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            buf.fill(0);
            return Ok(());
        };
        let file = file.as_file_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let file = self.ensure_created()?.as_file_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.len = len;
        if let Some(file) = self.file.as_ref() {
            file.as_file().set_len(len)?;
        }
        Ok(())
    }

    fn prepare_write(&mut self) -> io::Result<()> {
        self.ensure_created().map(|_| ())
    }

    fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_file_reads_zero_past_end() {
        let mut file = MemFile::new();
        file.write_at(2, &[7, 8]).unwrap();
        let mut buf = [9u8; 6];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 7, 8, 0, 0]);
        assert_eq!(file.writes(), 1);
    }

    #[test]
    fn mem_file_set_len_truncates() {
        let mut file = MemFile::new();
        file.write_at(0, &[1, 2, 3, 4]).unwrap();
        file.set_len(2).unwrap();
        assert_eq!(file.bytes(), &[1, 2]);
    }

    #[test]
    fn scratch_file_is_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ScratchFile::new(Some(dir.path().to_path_buf()));
        file.set_len(64).unwrap();
        assert!(file.path().is_none());

        let mut buf = [1u8; 8];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0; 8]);
        assert!(file.path().is_none());

        file.prepare_write().unwrap();
        let path = file.path().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
    }

    #[test]
    fn scratch_file_round_trip_and_removal() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ScratchFile::new(Some(dir.path().to_path_buf()));
        file.write_at(16, &[5, 6, 7]).unwrap();
        let mut buf = [0u8; 4];
        file.read_at(16, &mut buf).unwrap();
        assert_eq!(buf, [5, 6, 7, 0]);

        let path = file.path().unwrap().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }
}
