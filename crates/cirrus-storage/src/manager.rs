//! Scheme-based dispatch for filesystem operations

use std::sync::Arc;

use cirrus_core::{CirrusResult, Locator, ProviderRegistry};

use crate::vfs::{FileSystem, VFile};

/// Routes each call to the [`FileSystem`] registered for the locator's scheme.
#[derive(Clone, Default)]
pub struct VfsManager {
    registry: ProviderRegistry<dyn FileSystem>,
}

impl VfsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ProviderRegistry<dyn FileSystem>) -> Self {
        Self { registry }
    }

    pub async fn register(&self, fs: Arc<dyn FileSystem>) {
        self.registry.register(fs).await;
    }

    pub fn registry(&self) -> &ProviderRegistry<dyn FileSystem> {
        &self.registry
    }

    pub async fn create(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        self.registry.resolve(locator).await?.create(locator).await
    }

    pub async fn mkdir(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        self.registry.resolve(locator).await?.mkdir(locator).await
    }

    pub async fn mkdir_all(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        self.registry.resolve(locator).await?.mkdir_all(locator).await
    }

    pub async fn open(&self, locator: &Locator) -> CirrusResult<Box<dyn VFile>> {
        self.registry.resolve(locator).await?.open(locator).await
    }

    /// Parse `input` and open it.
    pub async fn open_str(&self, input: &str) -> CirrusResult<Box<dyn VFile>> {
        self.open(&Locator::parse(input)?).await
    }

    pub async fn exists(&self, locator: &Locator) -> CirrusResult<bool> {
        self.registry.resolve(locator).await?.exists(locator).await
    }
}
