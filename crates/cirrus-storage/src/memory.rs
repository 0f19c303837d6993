//! In-process object transport
//!
//! Keeps objects in a shared map so adapters can run without a network. Cloning the client
//! shares the same objects, which is how it doubles as its own [`ClientFactory`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use cirrus_core::{check_build, BackendKind, CirrusError, CirrusResult, ClientFactory, Profile};

use crate::client::{ByteStream, ObjectClient, ObjectHead, ObjectSummary};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    metadata: HashMap<String, String>,
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

/// Object transport backed by process memory
#[derive(Clone, Default)]
pub struct MemoryObjectClient {
    buckets: Arc<RwLock<Buckets>>,
    chunk_size: Option<usize>,
    built_regions: Arc<Mutex<Vec<String>>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver bodies in chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size.max(1));
        self
    }

    /// Regions of every profile a client was built from, in build order
    pub fn built_regions(&self) -> Vec<String> {
        self.built_regions
            .lock()
            .map(|regions| regions.clone())
            .unwrap_or_default()
    }

    /// Keys currently stored in `bucket`
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn not_found(bucket: &str, key: &str) -> CirrusError {
        CirrusError::NotFound(format!("{}/{}", bucket, key))
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn get(&self, bucket: &str, key: &str) -> CirrusResult<ByteStream> {
        let data = {
            let buckets = self.buckets.read().await;
            buckets
                .get(bucket)
                .and_then(|objects| objects.get(key))
                .map(|object| object.data.clone())
                .ok_or_else(|| Self::not_found(bucket, key))?
        };

        let chunk_size = self.chunk_size.unwrap_or(data.len()).max(1);
        let mut chunks: Vec<CirrusResult<Bytes>> = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + chunk_size).min(data.len());
            chunks.push(Ok(data.slice(offset..end)));
            offset = end;
        }

        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> CirrusResult<()> {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: body,
                last_modified: Utc::now(),
                metadata: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> CirrusResult<ObjectHead> {
        let buckets = self.buckets.read().await;
        let object = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| Self::not_found(bucket, key))?;

        Ok(ObjectHead {
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            metadata: object.metadata.clone(),
        })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> CirrusResult<Vec<ObjectSummary>> {
        let buckets = self.buckets.read().await;
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .collect())
    }

    async fn delete(&self, bucket: &str, key: &str) -> CirrusResult<()> {
        let mut buckets = self.buckets.write().await;
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn replace_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> CirrusResult<()> {
        let mut buckets = self.buckets.write().await;
        let object = buckets
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
            .ok_or_else(|| Self::not_found(bucket, key))?;

        object.metadata = metadata;
        object.last_modified = Utc::now();
        Ok(())
    }
}

impl ClientFactory<dyn ObjectClient> for MemoryObjectClient {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<dyn ObjectClient>> {
        check_build(profile, self.kind(), kind)?;
        if let Ok(mut regions) = self.built_regions.lock() {
            regions.push(profile.region().to_string());
        }
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let client = MemoryObjectClient::new();
        let result = client.get("bucket", "missing").await;
        assert!(matches!(result, Err(CirrusError::NotFound(_))));
        assert!(!client.exists("bucket", "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_streams_in_chunks() {
        let client = MemoryObjectClient::new().with_chunk_size(2);
        client
            .put("bucket", "key", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let chunks: Vec<Bytes> = client
            .get("bucket", "key")
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_list_is_prefix_scoped() {
        let client = MemoryObjectClient::new();
        for key in ["a/1", "a/2", "ab", "b/1"] {
            client.put("bucket", key, Bytes::new()).await.unwrap();
        }

        let keys: Vec<String> = client
            .list("bucket", "a/")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, vec!["a/1".to_string(), "a/2".to_string()]);
        assert!(client.list("other", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_metadata_requires_object() {
        let client = MemoryObjectClient::new();
        let result = client
            .replace_metadata("bucket", "key", HashMap::new())
            .await;
        assert!(matches!(result, Err(CirrusError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clones_share_objects() {
        let client = MemoryObjectClient::new();
        let built = client
            .build(&Profile::new("us-east-1"), BackendKind::ObjectStore)
            .unwrap();
        built.put("bucket", "key", Bytes::from_static(b"x")).await.unwrap();
        assert!(client.exists("bucket", "key").await.unwrap());
        assert_eq!(client.built_regions(), vec!["us-east-1".to_string()]);
    }
}
