use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cirrus_core::{
    BackendKind, CirrusError, CirrusResult, ClientFactory, HostPattern, Locator, ProfileRegistry,
    QueueAddress, SchemeProvider, QUEUE_SCHEME,
};

use crate::listener::poll_until_cancelled;
use crate::message::{Message, MESSAGE_ID_HEADER, RECEIPT_HEADER};
use crate::options::{BatchOutcome, Capabilities, MessagingOption, ReceiveOptions, BATCH_LIMIT};
use crate::provider::{Listener, MessagingProvider};
use crate::settings::MessagingSettings;
use crate::sqs::client::{OutgoingMessage, QueueClient, ReceivedMessage};

const PROVIDER_ID: &str = "sqs";

fn to_outgoing(message: &Message, id: String) -> CirrusResult<OutgoingMessage> {
    let attributes = message
        .headers()
        .filter(|(name, _)| *name != RECEIPT_HEADER && *name != MESSAGE_ID_HEADER)
        .map(|(name, value)| (name.to_string(), value.to_vec()))
        .collect();

    Ok(OutgoingMessage {
        id,
        body: message.read_as_str()?.to_string(),
        attributes,
    })
}

fn to_message(received: ReceivedMessage) -> Message {
    let mut message = Message::with_body(received.body);
    for (name, value) in received.attributes {
        message.set_header(name, value);
    }
    message.set_header(RECEIPT_HEADER, received.receipt_handle);
    message.set_header(MESSAGE_ID_HEADER, received.message_id);
    message
}

/// Queue adapter: `https://sqs.<region>.<domain>/<account>/<queue>`
///
/// Received messages carry `Receipt` and `MessageId` headers; pass the message back to
/// [`MessagingProvider::acknowledge`] to delete it from the queue.
pub struct SqsProvider {
    profiles: Arc<ProfileRegistry>,
    factory: Arc<dyn ClientFactory<dyn QueueClient>>,
    settings: MessagingSettings,
    hosts: HostPattern,
    shutdown: CancellationToken,
}

impl SqsProvider {
    pub fn new(
        profiles: Arc<ProfileRegistry>,
        factory: Arc<dyn ClientFactory<dyn QueueClient>>,
        settings: MessagingSettings,
    ) -> CirrusResult<Self> {
        let hosts = HostPattern::new("sqs", &settings.cloud_domain)?;
        Ok(Self {
            profiles,
            factory,
            settings,
            hosts,
            shutdown: CancellationToken::new(),
        })
    }

    /// Provider backed by the AWS SQS transport
    #[cfg(feature = "messaging-sqs")]
    pub fn aws(profiles: Arc<ProfileRegistry>, settings: MessagingSettings) -> CirrusResult<Self> {
        Self::new(
            profiles,
            Arc::new(crate::sqs::aws::SqsClientFactory::new()),
            settings,
        )
    }

    pub fn settings(&self) -> &MessagingSettings {
        &self.settings
    }

    pub fn address(&self, locator: &Locator) -> CirrusResult<QueueAddress> {
        QueueAddress::parse(locator, &self.hosts)
    }

    async fn connect(&self, locator: &Locator) -> CirrusResult<(QueueAddress, Arc<dyn QueueClient>)> {
        let address = self.address(locator)?;
        let profile = self.profiles.resolve(locator, BackendKind::Queue).await?;
        let client = self.factory.build(&profile, BackendKind::Queue)?;
        Ok((address, client))
    }

    fn receive_options(&self, options: &[MessagingOption]) -> ReceiveOptions {
        self.settings.receive_defaults.apply(options)
    }
}

impl SchemeProvider for SqsProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn schemes(&self) -> Vec<String> {
        vec![QUEUE_SCHEME.to_string()]
    }
}

#[async_trait]
impl MessagingProvider for SqsProvider {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            receive: true,
            acknowledge: true,
        }
    }

    async fn send(
        &self,
        locator: &Locator,
        message: &Message,
        _options: &[MessagingOption],
    ) -> CirrusResult<String> {
        let (address, client) = self.connect(locator).await?;
        let outgoing = to_outgoing(message, Uuid::new_v4().to_string())?;
        client.send_message(address.queue_url(), &outgoing).await
    }

    async fn send_batch(
        &self,
        locator: &Locator,
        messages: &[Message],
        _options: &[MessagingOption],
    ) -> CirrusResult<BatchOutcome> {
        if messages.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let (address, client) = self.connect(locator).await?;
        let entries = messages
            .iter()
            .map(|message| to_outgoing(message, Uuid::new_v4().to_string()))
            .collect::<CirrusResult<Vec<_>>>()?;

        let mut outcome = BatchOutcome {
            ids: entries.iter().map(|entry| entry.id.clone()).collect(),
            failed: Vec::new(),
        };

        let mut delivered = 0;
        for chunk in entries.chunks(BATCH_LIMIT) {
            match client.send_message_batch(address.queue_url(), chunk).await {
                Ok(result) => {
                    outcome.failed.extend(result.failed);
                    delivered += chunk.len();
                }
                Err(e) if delivered == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        queue = %address.queue_name(),
                        delivered,
                        undelivered = entries.len() - delivered,
                        error = %e,
                        "Queue batch interrupted"
                    );
                    outcome.fail_from(delivered, &e);
                    break;
                }
            }
        }

        tracing::debug!(
            queue = %address.queue_name(),
            entries = outcome.ids.len(),
            failed = outcome.failed.len(),
            "Queue batch dispatched"
        );

        Ok(outcome)
    }

    async fn receive(&self, locator: &Locator, _options: &[MessagingOption]) -> CirrusResult<Message> {
        let (address, client) = self.connect(locator).await?;
        let options = ReceiveOptions::new(1, 0);
        client
            .receive_messages(address.queue_url(), options)
            .await?
            .into_iter()
            .next()
            .map(to_message)
            .ok_or_else(|| CirrusError::NoMessageAvailable(address.queue_url().to_string()))
    }

    async fn receive_batch(
        &self,
        locator: &Locator,
        options: &[MessagingOption],
    ) -> CirrusResult<Vec<Message>> {
        let (address, client) = self.connect(locator).await?;
        let options = self.receive_options(options);
        if options.max_messages == 0 {
            return Ok(Vec::new());
        }
        let received = client
            .receive_messages(address.queue_url(), options)
            .await?;
        Ok(received.into_iter().map(to_message).collect())
    }

    async fn add_listener(
        &self,
        locator: &Locator,
        listener: Listener,
        cancel: CancellationToken,
        options: &[MessagingOption],
    ) -> CirrusResult<()> {
        let (address, client) = self.connect(locator).await?;
        let options = self.receive_options(options);
        let queue_url = address.queue_url().to_string();

        poll_until_cancelled(
            locator,
            listener,
            &cancel,
            &self.shutdown,
            self.settings.listener_backoff,
            || {
                let client = client.clone();
                let queue_url = queue_url.clone();
                async move {
                    if options.max_messages == 0 {
                        return Ok(Vec::new());
                    }
                    let received = client.receive_messages(&queue_url, options).await?;
                    Ok::<_, CirrusError>(received.into_iter().map(to_message).collect::<Vec<_>>())
                }
            },
        )
        .await
    }

    async fn acknowledge(&self, locator: &Locator, message: &Message) -> CirrusResult<()> {
        let receipt = message.receipt().ok_or_else(|| {
            CirrusError::InvalidPayload(format!("{}: message has no receipt header", locator))
        })?;
        let (address, client) = self.connect(locator).await?;
        client.delete_message(address.queue_url(), receipt).await
    }

    async fn close(&self) -> CirrusResult<()> {
        self.shutdown.cancel();
        tracing::debug!(provider = PROVIDER_ID, "Messaging provider closed");
        Ok(())
    }
}
