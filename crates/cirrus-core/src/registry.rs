//! Scheme-keyed provider registry
//!
//! Providers announce the locator schemes they serve; the registry maps each scheme to
//! exactly one provider so a locator can be routed to its adapter.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CirrusError, CirrusResult};
use crate::locator::Locator;

/// Anything that can be registered for one or more locator schemes.
pub trait SchemeProvider: Send + Sync {
    /// Stable identifier used in logs
    fn id(&self) -> &str;

    /// Schemes this provider serves
    fn schemes(&self) -> Vec<String>;
}

/// Registry for looking up providers by locator scheme.
///
/// Reads can happen concurrently; registration is serialized. Registering a second provider
/// for an existing scheme replaces the first one for that scheme.
pub struct ProviderRegistry<P: ?Sized + SchemeProvider> {
    providers: Arc<RwLock<HashMap<String, Arc<P>>>>,
}

impl<P: ?Sized + SchemeProvider> ProviderRegistry<P> {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `provider` for every scheme it advertises.
    pub async fn register(&self, provider: Arc<P>) {
        let schemes = provider.schemes();
        let mut providers = self.providers.write().await;

        for scheme in schemes {
            let scheme = scheme.to_lowercase();
            if let Some(previous) = providers.insert(scheme.clone(), provider.clone()) {
                tracing::warn!(
                    scheme = %scheme,
                    previous = %previous.id(),
                    provider = %provider.id(),
                    "Replacing provider for scheme"
                );
            } else {
                tracing::debug!(scheme = %scheme, provider = %provider.id(), "Registered provider");
            }
        }
    }

    /// Provider registered for `scheme`
    pub async fn lookup(&self, scheme: &str) -> CirrusResult<Arc<P>> {
        let providers = self.providers.read().await;

        providers
            .get(&scheme.to_lowercase())
            .cloned()
            .ok_or_else(|| CirrusError::NoProviderForScheme(scheme.to_string()))
    }

    /// Provider for the scheme of `locator`
    pub async fn resolve(&self, locator: &Locator) -> CirrusResult<Arc<P>> {
        self.lookup(locator.scheme()).await
    }

    pub async fn contains(&self, scheme: &str) -> bool {
        let providers = self.providers.read().await;
        providers.contains_key(&scheme.to_lowercase())
    }

    /// Registered schemes, sorted
    pub async fn schemes(&self) -> Vec<String> {
        let providers = self.providers.read().await;
        let mut schemes: Vec<String> = providers.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Every distinct registered provider
    pub async fn providers(&self) -> Vec<Arc<P>> {
        let providers = self.providers.read().await;
        let mut distinct: Vec<Arc<P>> = Vec::new();
        for provider in providers.values() {
            if !distinct.iter().any(|p| Arc::ptr_eq(p, provider)) {
                distinct.push(provider.clone());
            }
        }
        distinct
    }
}

// Manual impls: derives would require `P: Clone`/`P: Default`.
impl<P: ?Sized + SchemeProvider> Clone for ProviderRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            providers: self.providers.clone(),
        }
    }
}

impl<P: ?Sized + SchemeProvider> Default for ProviderRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
