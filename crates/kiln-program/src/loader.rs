//! Sources of program bytes.
//!
//! A [`DataLoader`] hands out byte ranges of a serialized program. The
//! parser asks for exactly what it needs, so a loader backed by a file
//! never has to map or buffer more than the program itself.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ProgramError;

/// Random-access source of program bytes.
pub trait DataLoader: Send + Sync {
    /// Total number of bytes available.
    fn size(&self) -> Result<usize, ProgramError>;

    /// Copy `len` bytes starting at `offset`.
    ///
    /// Fails with [`ProgramError::Malformed`] if the range runs past
    /// [`size`](Self::size).
    fn load(&self, offset: usize, len: usize) -> Result<Vec<u8>, ProgramError>;
}

fn check_range(offset: usize, len: usize, size: usize) -> Result<(), ProgramError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(ProgramError::Malformed {
            detail: format!("read of {len} bytes at offset {offset} exceeds size {size}"),
        }),
    }
}

// ── File ────────────────────────────────────────────────────────

/// Loads program bytes from a file on disk.
///
/// The file is opened once; loads seek and read under a lock, so a
/// single loader can be shared between threads.
pub struct FileDataLoader {
    path: PathBuf,
    file: Mutex<File>,
    size: usize,
}

impl FileDataLoader {
    /// Open `path` for reading.
    pub fn from(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = usize::try_from(file.metadata()?.len()).map_err(|_| ProgramError::Malformed {
            detail: format!("{} is too large to address", path.display()),
        })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            size,
        })
    }

    /// Path the loader was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataLoader for FileDataLoader {
    fn size(&self) -> Result<usize, ProgramError> {
        Ok(self.size)
    }

    fn load(&self, offset: usize, len: usize) -> Result<Vec<u8>, ProgramError> {
        check_range(offset, len, self.size)?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// ── Buffer ──────────────────────────────────────────────────────

/// Serves program bytes from memory the caller already holds.
pub struct BufferDataLoader<'a> {
    data: &'a [u8],
}

impl<'a> BufferDataLoader<'a> {
    /// Wrap an in-memory program.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl DataLoader for BufferDataLoader<'_> {
    fn size(&self) -> Result<usize, ProgramError> {
        Ok(self.data.len())
    }

    fn load(&self, offset: usize, len: usize) -> Result<Vec<u8>, ProgramError> {
        check_range(offset, len, self.data.len())?;
        Ok(self.data[offset..offset + len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kiln-loader-{tag}-{}", std::process::id()))
    }

    #[test]
    fn buffer_loader_serves_ranges() {
        let data = [1u8, 2, 3, 4, 5];
        let loader = BufferDataLoader::new(&data);
        assert_eq!(loader.size().unwrap(), 5);
        assert_eq!(loader.load(1, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(loader.load(5, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn buffer_loader_rejects_overrun() {
        let data = [0u8; 4];
        let loader = BufferDataLoader::new(&data);
        assert!(matches!(
            loader.load(2, 3),
            Err(ProgramError::Malformed { .. })
        ));
        assert!(loader.load(usize::MAX, 1).is_err());
    }

    #[test]
    fn file_loader_reads_file_contents() {
        let path = temp_path("read");
        File::create(&path)
            .unwrap()
            .write_all(b"kiln program bytes")
            .unwrap();
        let loader = FileDataLoader::from(&path).unwrap();
        assert_eq!(loader.size().unwrap(), 18);
        assert_eq!(loader.load(5, 7).unwrap(), b"program");
        assert_eq!(loader.path(), path.as_path());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn file_loader_missing_path_is_io_error() {
        let path = temp_path("missing");
        assert!(matches!(
            FileDataLoader::from(&path),
            Err(ProgramError::Io(_))
        ));
    }
}
