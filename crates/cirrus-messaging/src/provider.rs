//! Messaging capability trait

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use cirrus_core::{CirrusError, CirrusResult, Locator, SchemeProvider};

use crate::message::Message;
use crate::options::{BatchOutcome, Capabilities, MessagingOption};

/// Callback invoked once per message delivered to a listener
pub type Listener = Box<dyn FnMut(Message) + Send>;

/// A messaging backend serving one or more locator schemes
///
/// Providers that cannot receive report it through [`Capabilities`] and return
/// `UnsupportedOperation` from the receive family.
#[async_trait]
pub trait MessagingProvider: SchemeProvider {
    fn capabilities(&self) -> Capabilities;

    fn new_message(&self) -> Message {
        Message::new()
    }

    /// Send one message, returning the backend message id.
    async fn send(
        &self,
        locator: &Locator,
        message: &Message,
        options: &[MessagingOption],
    ) -> CirrusResult<String>;

    /// Send many messages; every entry gets a fresh identifier.
    ///
    /// Entries go out in requests of at most [`BATCH_LIMIT`](crate::BATCH_LIMIT). If a request
    /// fails in transport after an earlier one was delivered, the entries not yet delivered are
    /// reported in [`BatchOutcome::failed`] and the call still succeeds. A failure of the first
    /// request is returned as the error.
    async fn send_batch(
        &self,
        locator: &Locator,
        messages: &[Message],
        options: &[MessagingOption],
    ) -> CirrusResult<BatchOutcome>;

    /// Receive one message without waiting. Fails with `NoMessageAvailable` if none is ready.
    async fn receive(&self, locator: &Locator, options: &[MessagingOption]) -> CirrusResult<Message>;

    /// Receive up to `MaxMessages` messages, long-polling for `WaitTime` seconds.
    async fn receive_batch(
        &self,
        locator: &Locator,
        options: &[MessagingOption],
    ) -> CirrusResult<Vec<Message>>;

    /// Poll the source and hand every message to `listener` until `cancel` fires or the
    /// provider is closed.
    async fn add_listener(
        &self,
        locator: &Locator,
        listener: Listener,
        cancel: CancellationToken,
        options: &[MessagingOption],
    ) -> CirrusResult<()>;

    /// Acknowledge a received message so the backend does not redeliver it.
    async fn acknowledge(&self, _locator: &Locator, _message: &Message) -> CirrusResult<()> {
        Err(CirrusError::unsupported("acknowledge"))
    }

    /// Stop every listener started by this provider.
    async fn close(&self) -> CirrusResult<()>;
}
