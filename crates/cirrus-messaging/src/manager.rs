//! Scheme-based dispatch for messaging operations

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cirrus_core::{CirrusResult, Locator, ProviderRegistry};

use crate::message::Message;
use crate::options::{BatchOutcome, Capabilities, MessagingOption};
use crate::provider::{Listener, MessagingProvider};

/// Routes each call to the [`MessagingProvider`] registered for the locator's scheme.
#[derive(Clone, Default)]
pub struct MessagingManager {
    registry: ProviderRegistry<dyn MessagingProvider>,
}

impl MessagingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ProviderRegistry<dyn MessagingProvider>) -> Self {
        Self { registry }
    }

    pub async fn register(&self, provider: Arc<dyn MessagingProvider>) {
        self.registry.register(provider).await;
    }

    pub fn registry(&self) -> &ProviderRegistry<dyn MessagingProvider> {
        &self.registry
    }

    pub async fn capabilities(&self, locator: &Locator) -> CirrusResult<Capabilities> {
        Ok(self.registry.resolve(locator).await?.capabilities())
    }

    pub async fn new_message(&self, locator: &Locator) -> CirrusResult<Message> {
        Ok(self.registry.resolve(locator).await?.new_message())
    }

    pub async fn send(
        &self,
        locator: &Locator,
        message: &Message,
        options: &[MessagingOption],
    ) -> CirrusResult<String> {
        self.registry
            .resolve(locator)
            .await?
            .send(locator, message, options)
            .await
    }

    pub async fn send_batch(
        &self,
        locator: &Locator,
        messages: &[Message],
        options: &[MessagingOption],
    ) -> CirrusResult<BatchOutcome> {
        self.registry
            .resolve(locator)
            .await?
            .send_batch(locator, messages, options)
            .await
    }

    pub async fn receive(&self, locator: &Locator, options: &[MessagingOption]) -> CirrusResult<Message> {
        self.registry
            .resolve(locator)
            .await?
            .receive(locator, options)
            .await
    }

    pub async fn receive_batch(
        &self,
        locator: &Locator,
        options: &[MessagingOption],
    ) -> CirrusResult<Vec<Message>> {
        self.registry
            .resolve(locator)
            .await?
            .receive_batch(locator, options)
            .await
    }

    pub async fn add_listener(
        &self,
        locator: &Locator,
        listener: Listener,
        cancel: CancellationToken,
        options: &[MessagingOption],
    ) -> CirrusResult<()> {
        self.registry
            .resolve(locator)
            .await?
            .add_listener(locator, listener, cancel, options)
            .await
    }

    pub async fn acknowledge(&self, locator: &Locator, message: &Message) -> CirrusResult<()> {
        self.registry
            .resolve(locator)
            .await?
            .acknowledge(locator, message)
            .await
    }

    /// Close every registered provider; the last failure, if any, is returned.
    pub async fn close_all(&self) -> CirrusResult<()> {
        let mut last_error = None;
        for provider in self.registry.providers().await {
            if let Err(e) = provider.close().await {
                tracing::warn!(error = %e, provider = %provider.id(), "Failed to close messaging provider");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
