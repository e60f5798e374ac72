//! Positioned I/O on the local cache file.
//!
//! Readers and the fetch task share one open file. All access is positioned
//! (`pread`/`pwrite` style), so concurrent readers of disjoint regions never
//! contend on a seek cursor. The lock only guards the handle's lifetime.

use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub(crate) struct CacheFile {
    path: PathBuf,
    file: RwLock<Option<File>>,
}

impl CacheFile {
    /// Opens or creates the file without truncating existing content.
    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn len(&self) -> io::Result<u64> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or_else(closed_error)?;
        Ok(file.metadata()?.len())
    }

    pub(crate) fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or_else(closed_error)?;
        write_all_at(file, data, offset)
    }

    /// Reads until `buf` is full or the end of the file is reached.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or_else(closed_error)?;

        let mut filled = 0;
        while filled < buf.len() {
            match read_at(file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    pub(crate) fn sync(&self) -> io::Result<()> {
        match self.file.read().as_ref() {
            Some(file) => file.sync_data(),
            None => Ok(()),
        }
    }

    /// Releases the OS handle. Later I/O fails with a "closed" error.
    pub(crate) fn close(&self) {
        self.file.write().take();
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "cache file closed")
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::write_all_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match std::os::windows::fs::FileExt::seek_write(file, buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("core-cache-file-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_sparse_write_then_read() {
        let path = temp_path();
        let file = CacheFile::open(&path).unwrap();

        file.write_at(4096, b"tail").unwrap();
        file.write_at(0, b"head").unwrap();
        assert_eq!(file.len().unwrap(), 4100);

        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(4096, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"tail");
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"head");

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_read_past_end_is_short() {
        let path = temp_path();
        let file = CacheFile::open(&path).unwrap();
        file.write_at(0, b"abcdef").unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(file.read_at(4, &mut buf).unwrap(), 2);
        assert_eq!(file.read_at(100, &mut buf).unwrap(), 0);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_reopen_keeps_content() {
        let path = temp_path();
        CacheFile::open(&path).unwrap().write_at(0, b"persisted").unwrap();

        let reopened = CacheFile::open(&path).unwrap();
        let mut buf = [0u8; 9];
        reopened.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"persisted");
        assert_eq!(reopened.path(), path.as_path());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_io_after_close_fails() {
        let path = temp_path();
        let file = CacheFile::open(&path).unwrap();
        file.close();

        assert!(file.write_at(0, b"x").is_err());
        let mut buf = [0u8; 1];
        assert!(file.read_at(0, &mut buf).is_err());
        assert!(file.sync().is_ok());

        std::fs::remove_file(path).unwrap();
    }
}
