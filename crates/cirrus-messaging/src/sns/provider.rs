use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cirrus_core::{
    BackendKind, CirrusError, CirrusResult, ClientFactory, HostPattern, Locator, ProfileRegistry,
    SchemeProvider, TopicAddress,
};

use crate::message::{Message, MESSAGE_ID_HEADER, RECEIPT_HEADER};
use crate::options::{self, BatchOutcome, Capabilities, MessagingOption, BATCH_LIMIT};
use crate::provider::{Listener, MessagingProvider};
use crate::settings::MessagingSettings;
use crate::sns::client::{PublishEntry, TopicClient};

const PROVIDER_ID: &str = "sns";

fn to_entry(message: &Message, id: String, subject: Option<&str>) -> CirrusResult<PublishEntry> {
    Ok(PublishEntry {
        id,
        message: message.read_as_str()?.to_string(),
        subject: subject.map(str::to_string),
        attributes: message
            .headers()
            .filter(|(name, _)| *name != RECEIPT_HEADER && *name != MESSAGE_ID_HEADER)
            .map(|(name, value)| (name.to_string(), value.to_vec()))
            .collect(),
    })
}

/// Fan-out notification adapter: `sns://sns.<region>.<domain>/<account>/<topic>`
///
/// Publish only. The receive family reports `UnsupportedOperation`; check
/// [`MessagingProvider::capabilities`] before calling it.
pub struct SnsProvider {
    profiles: Arc<ProfileRegistry>,
    factory: Arc<dyn ClientFactory<dyn TopicClient>>,
    settings: MessagingSettings,
    hosts: HostPattern,
}

impl SnsProvider {
    pub fn new(
        profiles: Arc<ProfileRegistry>,
        factory: Arc<dyn ClientFactory<dyn TopicClient>>,
        settings: MessagingSettings,
    ) -> CirrusResult<Self> {
        let hosts = settings
            .topic_host_policy
            .host_pattern(&settings.cloud_domain)?;
        Ok(Self {
            profiles,
            factory,
            settings,
            hosts,
        })
    }

    /// Provider backed by the AWS SNS transport
    #[cfg(feature = "messaging-sns")]
    pub fn aws(profiles: Arc<ProfileRegistry>, settings: MessagingSettings) -> CirrusResult<Self> {
        Self::new(
            profiles,
            Arc::new(crate::sns::aws::SnsClientFactory::new()),
            settings,
        )
    }

    pub fn address(&self, locator: &Locator) -> CirrusResult<TopicAddress> {
        let schemes: Vec<&str> = self.settings.topic_schemes.iter().map(String::as_str).collect();
        TopicAddress::parse(locator, &schemes, &self.hosts)
    }

    async fn connect(&self, locator: &Locator) -> CirrusResult<(TopicAddress, Arc<dyn TopicClient>)> {
        let address = self.address(locator)?;
        let profile = self
            .profiles
            .resolve(locator, BackendKind::Notification)
            .await?;
        let client = self.factory.build(&profile, BackendKind::Notification)?;
        Ok((address, client))
    }
}

impl SchemeProvider for SnsProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn schemes(&self) -> Vec<String> {
        self.settings.topic_schemes.clone()
    }
}

#[async_trait]
impl MessagingProvider for SnsProvider {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            receive: false,
            acknowledge: false,
        }
    }

    async fn send(
        &self,
        locator: &Locator,
        message: &Message,
        options: &[MessagingOption],
    ) -> CirrusResult<String> {
        let (address, client) = self.connect(locator).await?;
        let entry = to_entry(message, Uuid::new_v4().to_string(), options::subject(options))?;
        client.publish(&address.topic_arn(), &entry).await
    }

    async fn send_batch(
        &self,
        locator: &Locator,
        messages: &[Message],
        options: &[MessagingOption],
    ) -> CirrusResult<BatchOutcome> {
        if messages.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let (address, client) = self.connect(locator).await?;
        let topic_arn = address.topic_arn();
        let subject = options::subject(options);
        let entries = messages
            .iter()
            .map(|message| to_entry(message, Uuid::new_v4().to_string(), subject))
            .collect::<CirrusResult<Vec<_>>>()?;

        let mut outcome = BatchOutcome {
            ids: entries.iter().map(|entry| entry.id.clone()).collect(),
            failed: Vec::new(),
        };
        let mut delivered = 0;
        for chunk in entries.chunks(BATCH_LIMIT) {
            match client.publish_batch(&topic_arn, chunk).await {
                Ok(result) => {
                    outcome.failed.extend(result.failed);
                    delivered += chunk.len();
                }
                Err(e) if delivered == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        topic = %topic_arn,
                        delivered,
                        undelivered = entries.len() - delivered,
                        error = %e,
                        "Topic batch interrupted"
                    );
                    outcome.fail_from(delivered, &e);
                    break;
                }
            }
        }

        Ok(outcome)
    }

    async fn receive(&self, _locator: &Locator, _options: &[MessagingOption]) -> CirrusResult<Message> {
        Err(CirrusError::unsupported("receive"))
    }

    async fn receive_batch(
        &self,
        _locator: &Locator,
        _options: &[MessagingOption],
    ) -> CirrusResult<Vec<Message>> {
        Err(CirrusError::unsupported("receive_batch"))
    }

    async fn add_listener(
        &self,
        _locator: &Locator,
        _listener: Listener,
        _cancel: CancellationToken,
        _options: &[MessagingOption],
    ) -> CirrusResult<()> {
        Err(CirrusError::unsupported("add_listener"))
    }

    async fn close(&self) -> CirrusResult<()> {
        Ok(())
    }
}
