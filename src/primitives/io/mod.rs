#![forbid(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

use crate::types::Result;

/// Positional access to the single file backing a page store.
pub trait FileIo: Send + Sync + 'static {
    /// Fills `dst` with the bytes starting at `off`; a short file is `UnexpectedEof`.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Writes all of `src` at `off`, extending the file when needed.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Flushes data and metadata to stable storage.
    fn sync_all(&self) -> Result<()>;
    /// Current file length in bytes.
    fn len(&self) -> Result<u64>;
    /// Returns true for a zero-length file.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Opens `path` for reading and writing, creating it when absent.
pub fn open_rw(path: impl AsRef<Path>) -> Result<StdFileIo> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(StdFileIo::new(file))
}

/// [`FileIo`] over a `std::fs::File` handle.
pub struct StdFileIo {
    file: File,
}

impl StdFileIo {
    /// Wraps an open handle.
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

#[cfg(unix)]
impl StdFileIo {
    fn read_exact(&self, off: u64, dst: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(dst, off)
    }

    fn write_all(&self, off: u64, src: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(src, off)
    }
}

#[cfg(windows)]
impl StdFileIo {
    fn read_exact(&self, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !dst.is_empty() {
            match self.file.seek_read(dst, off)? {
                0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                n => {
                    dst = &mut std::mem::take(&mut dst)[n..];
                    off += n as u64;
                }
            }
        }
        Ok(())
    }

    fn write_all(&self, mut off: u64, mut src: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !src.is_empty() {
            match self.file.seek_write(src, off)? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => {
                    src = &src[n..];
                    off += n as u64;
                }
            }
        }
        Ok(())
    }
}

impl FileIo for StdFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        Ok(self.read_exact(off, dst)?)
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        Ok(self.write_all(off, src)?)
    }

    fn sync_all(&self) -> Result<()> {
        Ok(self.file.sync_all()?)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
