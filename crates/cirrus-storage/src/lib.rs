//! Cirrus Storage Library
//!
//! Object-store adapter for the generic virtual filesystem layer. It includes the
//! [`FileSystem`]/[`VFile`] capability traits, the object transport trait with S3 and
//! in-memory implementations, and scheme-based dispatch.
//!
//! # Locator layout
//!
//! `scheme://authority/container/key...`: the authority selects the configuration profile,
//! the first path segment is the bucket and the remainder is the object key. Directories are
//! represented by `key/` marker objects.

pub mod client;
pub mod file;
pub mod filesystem;
pub mod manager;
#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod settings;
pub mod vfs;

// Re-export commonly used types
pub use client::{ByteStream, ObjectClient, ObjectHead, ObjectSummary};
pub use file::S3File;
pub use filesystem::S3FileSystem;
pub use manager::VfsManager;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryObjectClient;
#[cfg(feature = "storage-s3")]
pub use s3::{S3ClientFactory, S3ObjectClient};
pub use settings::StorageSettings;
pub use vfs::{FileInfo, FileSystem, VFile};
