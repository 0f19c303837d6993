//! Object-store filesystem
//!
//! Every handle resolves its profile through the shared [`ProfileRegistry`] and builds its own
//! client from it; clients are never pooled across handles.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use cirrus_core::{
    BackendKind, CirrusError, CirrusResult, ClientFactory, Locator, ObjectAddress,
    ProfileRegistry, SchemeProvider,
};

use crate::client::ObjectClient;
use crate::file::S3File;
use crate::settings::StorageSettings;
use crate::vfs::{FileSystem, VFile};

const PROVIDER_ID: &str = "s3";

/// Object-store implementation of [`FileSystem`]
#[derive(Clone)]
pub struct S3FileSystem {
    profiles: Arc<ProfileRegistry>,
    factory: Arc<dyn ClientFactory<dyn ObjectClient>>,
    settings: StorageSettings,
}

impl S3FileSystem {
    pub fn new(
        profiles: Arc<ProfileRegistry>,
        factory: Arc<dyn ClientFactory<dyn ObjectClient>>,
        settings: StorageSettings,
    ) -> Self {
        Self {
            profiles,
            factory,
            settings,
        }
    }

    /// File system backed by the AWS S3 transport
    #[cfg(feature = "storage-s3")]
    pub fn aws(profiles: Arc<ProfileRegistry>, settings: StorageSettings) -> Self {
        Self::new(profiles, Arc::new(crate::s3::S3ClientFactory::new()), settings)
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    pub fn address(&self, locator: &Locator) -> CirrusResult<ObjectAddress> {
        let schemes: Vec<&str> = self.settings.schemes.iter().map(String::as_str).collect();
        ObjectAddress::parse(locator, &schemes, self.settings.key_style)
    }

    async fn client_for(&self, locator: &Locator) -> CirrusResult<Arc<dyn ObjectClient>> {
        let profile = self
            .profiles
            .resolve(locator, BackendKind::ObjectStore)
            .await?;
        self.factory.build(&profile, BackendKind::ObjectStore)
    }

    pub(crate) async fn open_handle(&self, locator: &Locator) -> CirrusResult<S3File> {
        let address = self.address(locator)?;
        let client = self.client_for(locator).await?;
        Ok(S3File::new(self.clone(), address, client))
    }

    /// Key or directory marker present
    async fn occupied(client: &dyn ObjectClient, address: &ObjectAddress) -> CirrusResult<bool> {
        if client.exists(address.container(), address.key()).await? {
            return Ok(true);
        }
        let marker = address.marker_key();
        if marker != address.key() {
            return client.exists(address.container(), &marker).await;
        }
        Ok(false)
    }

    async fn ensure_absent(client: &dyn ObjectClient, address: &ObjectAddress) -> CirrusResult<()> {
        if address.key().is_empty() {
            return Err(CirrusError::InvalidLocator(format!(
                "{}: an object key is required",
                address.locator()
            )));
        }
        if Self::occupied(client, address).await? {
            return Err(CirrusError::AlreadyExists(address.locator().to_string()));
        }
        Ok(())
    }

    async fn put_marker(
        client: &dyn ObjectClient,
        container: &str,
        marker: &str,
    ) -> CirrusResult<()> {
        client.put(container, marker, Bytes::new()).await
    }
}

impl SchemeProvider for S3FileSystem {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn schemes(&self) -> Vec<String> {
        self.settings.schemes.clone()
    }
}

#[async_trait]
impl FileSystem for S3FileSystem {
    async fn create(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        let file = self.open_handle(locator).await?;
        let client = file.client();
        let address = file.address();

        Self::ensure_absent(client.as_ref(), address).await?;
        client
            .put(address.container(), address.key(), Bytes::new())
            .await?;

        tracing::debug!(locator = %locator, "Created empty object");
        Ok(Box::new(file))
    }

    async fn mkdir(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        let file = self.open_handle(locator).await?;
        let client = file.client();
        let address = file.address();

        Self::ensure_absent(client.as_ref(), address).await?;
        Self::put_marker(client.as_ref(), address.container(), &address.marker_key()).await?;

        tracing::debug!(locator = %locator, "Created directory marker");
        Ok(Box::new(file))
    }

    async fn mkdir_all(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        let file = self.open_handle(locator).await?;
        let client = file.client();
        let address = file.address();

        Self::ensure_absent(client.as_ref(), address).await?;

        let key = address.key();
        for (index, _) in key.match_indices('/') {
            if index == 0 || index + 1 == key.len() {
                continue;
            }
            let ancestor = &key[..=index];
            if !client.exists(address.container(), ancestor).await? {
                Self::put_marker(client.as_ref(), address.container(), ancestor).await?;
            }
        }
        Self::put_marker(client.as_ref(), address.container(), &address.marker_key()).await?;

        tracing::debug!(locator = %locator, "Created directory markers");
        Ok(Box::new(file))
    }

    async fn open(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        Ok(Box::new(self.open_handle(locator).await?))
    }

    async fn exists(&self, locator: &Locator) -> CirrusResult<bool> {
        let address = self.address(locator)?;
        let client = self.client_for(locator).await?;
        Self::occupied(client.as_ref(), &address).await
    }
}
