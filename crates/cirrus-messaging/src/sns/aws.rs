use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::config::{BehaviorVersion, Region};
use aws_sdk_sns::primitives::Blob;
use aws_sdk_sns::types::{MessageAttributeValue, PublishBatchRequestEntry};
use aws_sdk_sns::Client;

use cirrus_core::{check_build, BackendKind, CirrusError, CirrusResult, ClientFactory, Profile};

use crate::options::{BatchEntryFailure, BatchSendResult};
use crate::sns::client::{PublishEntry, TopicClient};

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn to_attributes(
    attributes: &BTreeMap<String, Vec<u8>>,
) -> CirrusResult<Option<HashMap<String, MessageAttributeValue>>> {
    if attributes.is_empty() {
        return Ok(None);
    }

    attributes
        .iter()
        .map(|(name, value)| {
            let builder = match std::str::from_utf8(value) {
                Ok(text) => MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(text),
                Err(_) => MessageAttributeValue::builder()
                    .data_type("Binary")
                    .binary_value(Blob::new(value.clone())),
            };
            builder
                .build()
                .map(|attribute| (name.clone(), attribute))
                .map_err(|e| {
                    CirrusError::InvalidPayload(format!("message attribute '{}': {}", name, e))
                })
        })
        .collect::<CirrusResult<HashMap<_, _>>>()
        .map(Some)
}

/// SNS topic transport
#[derive(Clone, Debug)]
pub struct SnsTopicClient {
    client: Client,
}

impl SnsTopicClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn transport_error<E: std::fmt::Display>(
        &self,
        operation: &str,
        topic_arn: &str,
        error: &E,
        start: Instant,
    ) -> CirrusError {
        tracing::error!(
            error = %error,
            topic_arn = %topic_arn,
            duration_ms = elapsed_ms(start),
            "SNS {} failed",
            operation
        );
        CirrusError::Transport(format!("{} {}: {}", operation, topic_arn, error))
    }
}

#[async_trait]
impl TopicClient for SnsTopicClient {
    async fn publish(&self, topic_arn: &str, entry: &PublishEntry) -> CirrusResult<String> {
        let start = Instant::now();

        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(&entry.message)
            .set_subject(entry.subject.clone())
            .set_message_attributes(to_attributes(&entry.attributes)?)
            .send()
            .await
            .map_err(|e| self.transport_error("publish", topic_arn, &e, start))?;

        let message_id = output.message_id().unwrap_or_default().to_string();

        tracing::info!(
            topic_arn = %topic_arn,
            message_id = %message_id,
            size_bytes = entry.message.len(),
            duration_ms = elapsed_ms(start),
            "SNS notification published"
        );

        Ok(message_id)
    }

    async fn publish_batch(
        &self,
        topic_arn: &str,
        entries: &[PublishEntry],
    ) -> CirrusResult<BatchSendResult> {
        let start = Instant::now();

        let mut request_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            let request_entry = PublishBatchRequestEntry::builder()
                .id(&entry.id)
                .message(&entry.message)
                .set_subject(entry.subject.clone())
                .set_message_attributes(to_attributes(&entry.attributes)?)
                .build()
                .map_err(|e| CirrusError::InvalidPayload(format!("batch entry {}: {}", entry.id, e)))?;
            request_entries.push(request_entry);
        }

        let output = self
            .client
            .publish_batch()
            .topic_arn(topic_arn)
            .set_publish_batch_request_entries(Some(request_entries))
            .send()
            .await
            .map_err(|e| self.transport_error("publish_batch", topic_arn, &e, start))?;

        let successful = output
            .successful()
            .iter()
            .filter_map(|entry| {
                let id: Option<&str> = entry.id().into();
                id.map(str::to_string)
            })
            .collect();

        let failed: Vec<BatchEntryFailure> = output
            .failed()
            .iter()
            .map(|entry| {
                let id: Option<&str> = entry.id().into();
                let code: Option<&str> = entry.code().into();
                let sender_fault: Option<bool> = entry.sender_fault().into();
                BatchEntryFailure {
                    id: id.unwrap_or_default().to_string(),
                    code: code.unwrap_or_default().to_string(),
                    message: entry.message().unwrap_or_default().to_string(),
                    sender_fault: sender_fault.unwrap_or(false),
                }
            })
            .collect();

        tracing::info!(
            topic_arn = %topic_arn,
            entries = entries.len(),
            failed = failed.len(),
            duration_ms = elapsed_ms(start),
            "SNS batch published"
        );

        Ok(BatchSendResult { successful, failed })
    }
}

/// Builds [`SnsTopicClient`]s from resolved profiles
#[derive(Clone, Debug, Default)]
pub struct SnsClientFactory {
    fallback_credentials: Option<SharedCredentialsProvider>,
}

impl SnsClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_credentials(mut self, provider: SharedCredentialsProvider) -> Self {
        self.fallback_credentials = Some(provider);
        self
    }
}

impl ClientFactory<dyn TopicClient> for SnsClientFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Notification
    }

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<dyn TopicClient>> {
        check_build(profile, self.kind(), kind)?;

        let mut builder = aws_sdk_sns::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(profile.region().to_string()));

        if let Some(provider) = profile
            .credentials()
            .cloned()
            .or_else(|| self.fallback_credentials.clone())
        {
            builder = builder.credentials_provider(provider);
        }

        if let Some(endpoint) = profile.endpoint_url() {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Arc::new(SnsTopicClient::new(Client::from_conf(builder.build()))))
    }
}
