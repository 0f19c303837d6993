//! Object-store file handle
//!
//! A handle moves through three states: `Unopened` until the first read fetches the body,
//! `Open` while a body stream is being consumed, and `Closed` after [`VFile::close`]. Writing
//! retires the current body so the next read fetches the new content. Every body a handle has
//! fetched is released on close; release failures are reduced to the last one seen.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use futures::StreamExt;

use cirrus_core::{CirrusError, CirrusResult, Locator, ObjectAddress};

use crate::client::{ByteStream, ObjectClient};
use crate::filesystem::S3FileSystem;
use crate::vfs::{FileInfo, VFile};

/// Body stream acquired by a read
struct ObjectBody {
    stream: ByteStream,
    pending: Bytes,
    finished: bool,
    failure: Option<String>,
}

impl ObjectBody {
    fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            pending: Bytes::new(),
            finished: false,
            failure: None,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> CirrusResult<usize> {
        while self.pending.is_empty() {
            if self.finished {
                return Ok(0);
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => {
                    self.finished = true;
                    self.failure = Some(e.to_string());
                    return Err(e);
                }
                None => {
                    self.finished = true;
                    return Ok(0);
                }
            }
        }

        let read = buf.len().min(self.pending.len());
        buf[..read].copy_from_slice(&self.pending[..read]);
        self.pending.advance(read);
        Ok(read)
    }

    /// Drop the stream, reporting a failure recorded while it was consumed.
    fn release(self) -> CirrusResult<()> {
        match self.failure {
            Some(failure) => Err(CirrusError::Transport(format!(
                "body stream failed: {}",
                failure
            ))),
            None => Ok(()),
        }
    }
}

enum HandleState {
    Unopened,
    Open(ObjectBody),
    Closed,
}

/// Handle on one object (or directory prefix) in an object store
pub struct S3File {
    fs: S3FileSystem,
    address: ObjectAddress,
    client: Arc<dyn ObjectClient>,
    state: HandleState,
    closers: Vec<ObjectBody>,
}

impl S3File {
    pub(crate) fn new(fs: S3FileSystem, address: ObjectAddress, client: Arc<dyn ObjectClient>) -> Self {
        Self {
            fs,
            address,
            client,
            state: HandleState::Unopened,
            closers: Vec::new(),
        }
    }

    pub fn address(&self) -> &ObjectAddress {
        &self.address
    }

    pub(crate) fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, HandleState::Closed)
    }

    fn ensure_open(&self) -> CirrusResult<()> {
        if self.is_closed() {
            return Err(CirrusError::Closed(self.address.locator().to_string()));
        }
        Ok(())
    }

    /// Move the current body (if any) onto the close list.
    fn retire_body(&mut self) {
        if let HandleState::Open(body) = std::mem::replace(&mut self.state, HandleState::Unopened) {
            self.closers.push(body);
        }
    }
}

#[async_trait]
impl VFile for S3File {
    fn locator(&self) -> &Locator {
        self.address.locator()
    }

    async fn read(&mut self, buf: &mut [u8]) -> CirrusResult<usize> {
        self.ensure_open()?;

        if matches!(self.state, HandleState::Unopened) {
            let stream = self
                .client
                .get(self.address.container(), self.address.key())
                .await?;
            tracing::debug!(locator = %self.address.locator(), "Opened object body");
            self.state = HandleState::Open(ObjectBody::new(stream));
        }

        match &mut self.state {
            HandleState::Open(body) => body.read(buf).await,
            _ => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> CirrusResult<usize> {
        self.ensure_open()?;

        self.client
            .put(
                self.address.container(),
                self.address.key(),
                Bytes::copy_from_slice(data),
            )
            .await?;
        self.retire_body();
        Ok(data.len())
    }

    async fn list_all(&mut self) -> CirrusResult<Vec<Box<dyn VFile>>> {
        self.ensure_open()?;

        let key = self.address.key();
        let marker = self.address.marker_key();
        let summaries = self.client.list(self.address.container(), key).await?;

        let mut files: Vec<Box<dyn VFile>> = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if summary.key == key || summary.key == marker {
                continue;
            }
            let child = self.address.child(&summary.key);
            files.push(Box::new(S3File::new(
                self.fs.clone(),
                child,
                self.client.clone(),
            )));
        }

        tracing::debug!(
            locator = %self.address.locator(),
            children = files.len(),
            "Listed object prefix"
        );
        Ok(files)
    }

    async fn info(&mut self) -> CirrusResult<FileInfo> {
        self.ensure_open()?;

        let head = self
            .client
            .head(self.address.container(), self.address.key())
            .await?;
        let key = self.address.key();

        Ok(FileInfo {
            name: key.to_string(),
            size: head.size,
            last_modified: head.last_modified,
            is_dir: key.is_empty() || key.ends_with('/'),
        })
    }

    async fn add_property(&mut self, name: &str, value: &str) -> CirrusResult<()> {
        self.ensure_open()?;

        let container = self.address.container();
        let key = self.address.key();

        let mut metadata = if self.fs.settings().merge_properties {
            self.client.head(container, key).await?.metadata
        } else {
            HashMap::new()
        };
        metadata.insert(name.to_string(), value.to_string());

        self.client.replace_metadata(container, key, metadata).await
    }

    async fn get_property(&mut self, name: &str) -> CirrusResult<Option<String>> {
        self.ensure_open()?;

        let mut head = self
            .client
            .head(self.address.container(), self.address.key())
            .await?;
        Ok(head.metadata.remove(name))
    }

    async fn delete(&mut self) -> CirrusResult<()> {
        self.ensure_open()?;

        self.client
            .delete(self.address.container(), self.address.key())
            .await?;
        self.retire_body();
        Ok(())
    }

    async fn close(&mut self) -> CirrusResult<()> {
        if let HandleState::Open(body) = std::mem::replace(&mut self.state, HandleState::Closed) {
            self.closers.push(body);
        }

        let mut last_error = None;
        for body in self.closers.drain(..) {
            if let Err(e) = body.release() {
                tracing::warn!(
                    error = %e,
                    locator = %self.address.locator(),
                    "Failed to release object body"
                );
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ObjectHead, ObjectSummary};
    use crate::settings::StorageSettings;
    use crate::vfs::FileSystem;
    use cirrus_core::{
        AmbientConfig, BackendKind, ClientFactory, Profile, ProfileRegistry,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticAmbient;

    #[async_trait]
    impl AmbientConfig for StaticAmbient {
        async fn load(&self) -> CirrusResult<Profile> {
            Ok(Profile::new("us-east-1"))
        }
    }

    /// Serves "abc" and then fails the stream; counts fetches.
    #[derive(Default)]
    struct FlakyClient {
        gets: AtomicUsize,
    }

    #[async_trait]
    impl ObjectClient for FlakyClient {
        async fn get(&self, _bucket: &str, _key: &str) -> CirrusResult<ByteStream> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let items: Vec<CirrusResult<Bytes>> = vec![
                Ok(Bytes::from_static(b"abc")),
                Err(CirrusError::Transport("connection reset".to_string())),
            ];
            Ok(Box::pin(futures::stream::iter(items)))
        }

        async fn put(&self, _bucket: &str, _key: &str, _body: Bytes) -> CirrusResult<()> {
            Ok(())
        }

        async fn head(&self, bucket: &str, key: &str) -> CirrusResult<ObjectHead> {
            Err(CirrusError::NotFound(format!("{}/{}", bucket, key)))
        }

        async fn list(&self, _bucket: &str, _prefix: &str) -> CirrusResult<Vec<ObjectSummary>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> CirrusResult<()> {
            Ok(())
        }

        async fn replace_metadata(
            &self,
            bucket: &str,
            key: &str,
            _metadata: HashMap<String, String>,
        ) -> CirrusResult<()> {
            Err(CirrusError::NotFound(format!("{}/{}", bucket, key)))
        }
    }

    struct FlakyFactory(Arc<FlakyClient>);

    impl ClientFactory<dyn ObjectClient> for FlakyFactory {
        fn kind(&self) -> BackendKind {
            BackendKind::ObjectStore
        }

        fn build(&self, _profile: &Profile, _kind: BackendKind) -> CirrusResult<Arc<dyn ObjectClient>> {
            Ok(self.0.clone())
        }
    }

    async fn flaky_file() -> (Arc<FlakyClient>, S3File) {
        let client = Arc::new(FlakyClient::default());
        let fs = S3FileSystem::new(
            Arc::new(ProfileRegistry::new(Arc::new(StaticAmbient))),
            Arc::new(FlakyFactory(client.clone())),
            StorageSettings::default(),
        );
        let locator = Locator::parse("s3://endpoint/bucket/key").unwrap();
        let file = fs.open_handle(&locator).await.unwrap();
        (client, file)
    }

    #[tokio::test]
    async fn test_open_does_not_fetch() {
        let (client, _file) = flaky_file().await;
        assert_eq!(client.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_is_lazy_and_partial() {
        let (client, mut file) = flaky_file().await;
        let mut buf = [0u8; 2];

        assert_eq!(file.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(file.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], b'c');
        assert_eq!(client.gets.load(Ordering::SeqCst), 1);

        let err = file.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, CirrusError::Transport(_)));
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_reports_last_release_error() {
        let (client, mut file) = flaky_file().await;

        // First body fails, then a write retires it and a second body fails too.
        assert!(file.read_to_end().await.is_err());
        file.write(b"new").await.unwrap();
        assert!(file.read_to_end().await.is_err());
        assert_eq!(client.gets.load(Ordering::SeqCst), 2);

        let err = file.close().await.unwrap_err();
        assert!(matches!(err, CirrusError::Transport(_)));

        // Resources were drained by the first close.
        file.close().await.unwrap();
        assert!(file.is_closed());
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let (_client, mut file) = flaky_file().await;
        file.close().await.unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(file.read(&mut buf).await, Err(CirrusError::Closed(_))));
        assert!(matches!(file.write(b"x").await, Err(CirrusError::Closed(_))));
        assert!(matches!(file.info().await, Err(CirrusError::Closed(_))));
        assert!(matches!(file.delete().await, Err(CirrusError::Closed(_))));
    }

    #[tokio::test]
    async fn test_info_missing_object_is_not_found() {
        let (_client, mut file) = flaky_file().await;
        assert!(matches!(file.info().await, Err(CirrusError::NotFound(_))));
        assert!(!file
            .fs
            .exists(&Locator::parse("s3://endpoint/bucket/key").unwrap())
            .await
            .unwrap());
    }
}
