//! Virtual filesystem capability traits
//!
//! These are the generic interfaces callers program against. A [`FileSystem`] is registered
//! under one or more locator schemes and hands out [`VFile`] handles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cirrus_core::{CirrusResult, Locator, SchemeProvider};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Metadata describing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Object key (full path within the container)
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// A filesystem serving one or more locator schemes
#[async_trait]
pub trait FileSystem: SchemeProvider {
    /// Create an empty file. Fails with `AlreadyExists` if anything lives at the location.
    async fn create(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>>;

    /// Create a directory. Fails with `AlreadyExists` if anything lives at the location.
    async fn mkdir(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>>;

    /// Create a directory and any missing parents.
    async fn mkdir_all(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>>;

    /// Open a handle without touching the backend.
    async fn open(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>>;

    /// Whether a file or directory exists at the location
    async fn exists(&self, locator: &Locator) -> CirrusResult<bool>;
}

/// An open file handle
#[async_trait]
pub trait VFile: Send {
    fn locator(&self) -> &Locator;

    /// Read into `buf`, returning the number of bytes read (0 at end of file).
    async fn read(&mut self, buf: &mut [u8]) -> CirrusResult<usize>;

    /// Read everything remaining.
    async fn read_to_end(&mut self) -> CirrusResult<Vec<u8>> {
        let mut content = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let read = self.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            content.extend_from_slice(&buf[..read]);
        }
        Ok(content)
    }

    /// Replace the file content, returning the number of bytes written.
    async fn write(&mut self, data: &[u8]) -> CirrusResult<usize>;

    /// Handles for every child below this location
    async fn list_all(&mut self) -> CirrusResult<Vec<Box<dyn VFile>>>;

    async fn info(&mut self) -> CirrusResult<FileInfo>;

    async fn add_property(&mut self, name: &str, value: &str) -> CirrusResult<()>;

    async fn get_property(&mut self, name: &str) -> CirrusResult<Option<String>>;

    async fn delete(&mut self) -> CirrusResult<()>;

    /// Release every resource acquired by this handle.
    async fn close(&mut self) -> CirrusResult<()>;
}
