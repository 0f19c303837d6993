//! Object transport abstraction
//!
//! The object-store adapter talks to the backend only through [`ObjectClient`]: fetch, put,
//! head, list, delete and metadata replacement of single objects. Implementations classify
//! backend failures into `NotFound` and `Transport`.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;

use cirrus_core::{CirrusError, CirrusResult};

/// Streaming object body
pub type ByteStream = Pin<Box<dyn Stream<Item = CirrusResult<Bytes>> + Send>>;

/// Result of a head request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Fetch the body of an object. Fails with `NotFound` if the object is absent.
    async fn get(&self, bucket: &str, key: &str) -> CirrusResult<ByteStream>;

    /// Create or replace an object.
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> CirrusResult<()>;

    /// Fetch size, timestamp and user metadata. Fails with `NotFound` if the object is absent.
    async fn head(&self, bucket: &str, key: &str) -> CirrusResult<ObjectHead>;

    /// Every object whose key starts with `prefix`, across all pages.
    async fn list(&self, bucket: &str, prefix: &str) -> CirrusResult<Vec<ObjectSummary>>;

    /// Delete an object; deleting an absent object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> CirrusResult<()>;

    /// Replace the whole user-metadata set of an existing object.
    async fn replace_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> CirrusResult<()>;

    /// Existence probe built on `head`: not-found is `false`, anything else is an error.
    async fn exists(&self, bucket: &str, key: &str) -> CirrusResult<bool> {
        match self.head(bucket, key).await {
            Ok(_) => Ok(true),
            Err(CirrusError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
