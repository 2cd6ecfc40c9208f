//! Raw file sources handed over by the UI (drop zone, file picker).
//!
//! Content is read only when it is needed for an upload; the registry never
//! materializes the bytes of a local file on its own.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file the user picked, with lazily readable content.
pub trait RawFile: fmt::Debug + Send + Sync {
    /// File name including extension.
    fn name(&self) -> &str;

    /// Size in bytes as reported by the source.
    fn byte_size(&self) -> u64;

    /// Read the full content.
    fn read_bytes(&self) -> io::Result<Vec<u8>>;
}

/// Shared handle to a raw file.
pub type SharedRawFile = Arc<dyn RawFile>;

/// A raw file whose bytes are already in memory.
#[derive(Clone)]
pub struct InMemoryFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl InMemoryFile {
    /// Create an in-memory file.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Wrap into a shared handle.
    pub fn shared(self) -> SharedRawFile {
        Arc::new(self)
    }
}

impl fmt::Debug for InMemoryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl RawFile for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }
}

/// A raw file on disk, read on demand.
#[derive(Debug, Clone)]
pub struct DiskFile {
    name: String,
    path: PathBuf,
    size: u64,
}

impl DiskFile {
    /// Stat a file on disk. The content is not read.
    pub fn open(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))?
            .to_string();

        Ok(Self {
            name,
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    /// Wrap into a shared handle.
    pub fn shared(self) -> SharedRawFile {
        Arc::new(self)
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn byte_size(&self) -> u64 {
        self.size
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}
