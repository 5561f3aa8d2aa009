//! Byte-range access to the file being searched.
//!
//! The indexer and searcher never hold more than a chunk of the file at a
//! time; everything they need from the file goes through
//! [`FileSource::read_range`].

use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A file-like object that can hand out byte slices asynchronously
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Total size in bytes
    fn size(&self) -> u64;

    /// Display name (file name without directories)
    fn name(&self) -> &str;

    /// Read bytes `start..end`. `end` is clamped to [`FileSource::size`].
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>>;
}

/// A file on the local file system.
///
/// Each read opens the file, seeks and reads the requested range, so no
/// handle or buffer is kept between reads.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl LocalFile {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileSource for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let end = end.min(self.size);
        if start >= end {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// In-memory bytes behind the same interface, for hosts that already hold
/// the data and for tests
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl FileSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let len = self.data.len();
        let end = (end as usize).min(len);
        let start = (start as usize).min(end);
        Ok(self.data[start..end].to_vec())
    }
}
