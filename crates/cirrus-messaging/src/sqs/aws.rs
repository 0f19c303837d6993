use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sqs::config::{BehaviorVersion, Region};
use aws_sdk_sqs::primitives::Blob;
use aws_sdk_sqs::types::{MessageAttributeValue, SendMessageBatchRequestEntry};
use aws_sdk_sqs::Client;

use cirrus_core::{check_build, BackendKind, CirrusError, CirrusResult, ClientFactory, Profile};

use crate::options::{BatchEntryFailure, BatchSendResult, ReceiveOptions};
use crate::sqs::client::{OutgoingMessage, QueueClient, ReceivedMessage};

const STRING_TYPE: &str = "String";
const BINARY_TYPE: &str = "Binary";

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// UTF-8 values travel as `String` attributes, anything else as `Binary`.
fn to_attributes(
    attributes: &BTreeMap<String, Vec<u8>>,
) -> CirrusResult<Option<HashMap<String, MessageAttributeValue>>> {
    if attributes.is_empty() {
        return Ok(None);
    }

    let mut converted = HashMap::with_capacity(attributes.len());
    for (name, value) in attributes {
        let builder = match std::str::from_utf8(value) {
            Ok(text) => MessageAttributeValue::builder()
                .data_type(STRING_TYPE)
                .string_value(text),
            Err(_) => MessageAttributeValue::builder()
                .data_type(BINARY_TYPE)
                .binary_value(Blob::new(value.clone())),
        };
        let attribute = builder.build().map_err(|e| {
            CirrusError::InvalidPayload(format!("message attribute '{}': {}", name, e))
        })?;
        converted.insert(name.clone(), attribute);
    }
    Ok(Some(converted))
}

fn from_attributes(
    attributes: Option<&HashMap<String, MessageAttributeValue>>,
) -> BTreeMap<String, Vec<u8>> {
    attributes
        .into_iter()
        .flatten()
        .filter_map(|(name, value)| {
            let bytes = match (value.string_value(), value.binary_value()) {
                (Some(text), _) => text.as_bytes().to_vec(),
                (None, Some(blob)) => blob.as_ref().to_vec(),
                (None, None) => return None,
            };
            Some((name.clone(), bytes))
        })
        .collect()
}

/// SQS queue transport
#[derive(Clone, Debug)]
pub struct SqsQueueClient {
    client: Client,
}

impl SqsQueueClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn transport_error<E: std::fmt::Display>(
        &self,
        operation: &str,
        queue_url: &str,
        error: &E,
        start: Instant,
    ) -> CirrusError {
        tracing::error!(
            error = %error,
            queue_url = %queue_url,
            duration_ms = elapsed_ms(start),
            "SQS {} failed",
            operation
        );
        CirrusError::Transport(format!("{} {}: {}", operation, queue_url, error))
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn send_message(&self, queue_url: &str, message: &OutgoingMessage) -> CirrusResult<String> {
        let start = Instant::now();

        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(&message.body)
            .set_message_attributes(to_attributes(&message.attributes)?)
            .send()
            .await
            .map_err(|e| self.transport_error("send_message", queue_url, &e, start))?;

        let message_id = output.message_id().unwrap_or_default().to_string();

        tracing::info!(
            queue_url = %queue_url,
            message_id = %message_id,
            size_bytes = message.body.len(),
            duration_ms = elapsed_ms(start),
            "SQS message sent"
        );

        Ok(message_id)
    }

    async fn send_message_batch(
        &self,
        queue_url: &str,
        messages: &[OutgoingMessage],
    ) -> CirrusResult<BatchSendResult> {
        let start = Instant::now();

        let mut entries = Vec::with_capacity(messages.len());
        for message in messages {
            let entry = SendMessageBatchRequestEntry::builder()
                .id(&message.id)
                .message_body(&message.body)
                .set_message_attributes(to_attributes(&message.attributes)?)
                .build()
                .map_err(|e| CirrusError::InvalidPayload(format!("batch entry {}: {}", message.id, e)))?;
            entries.push(entry);
        }

        let output = self
            .client
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| self.transport_error("send_message_batch", queue_url, &e, start))?;

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

        if failed.is_empty() {
            tracing::info!(
                queue_url = %queue_url,
                entries = messages.len(),
                duration_ms = elapsed_ms(start),
                "SQS batch sent"
            );
        } else {
            tracing::warn!(
                queue_url = %queue_url,
                entries = messages.len(),
                failed = failed.len(),
                duration_ms = elapsed_ms(start),
                "SQS batch partially failed"
            );
        }

        Ok(BatchSendResult { successful, failed })
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> CirrusResult<Vec<ReceivedMessage>> {
        let start = Instant::now();

        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(options.max_messages)
            .wait_time_seconds(options.wait_time_secs)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| self.transport_error("receive_message", queue_url, &e, start))?;

        let messages: Vec<ReceivedMessage> = output
            .messages()
            .iter()
            .map(|message| {
                let attributes: Option<&HashMap<String, MessageAttributeValue>> =
                    message.message_attributes().into();
                ReceivedMessage {
                    message_id: message.message_id().unwrap_or_default().to_string(),
                    receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
                    body: message.body().unwrap_or_default().to_string(),
                    attributes: from_attributes(attributes),
                }
            })
            .collect();

        tracing::debug!(
            queue_url = %queue_url,
            received = messages.len(),
            max_messages = options.max_messages,
            wait_time_secs = options.wait_time_secs,
            duration_ms = elapsed_ms(start),
            "SQS receive completed"
        );

        Ok(messages)
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> CirrusResult<()> {
        let start = Instant::now();

        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| self.transport_error("delete_message", queue_url, &e, start))?;

        tracing::info!(
            queue_url = %queue_url,
            duration_ms = elapsed_ms(start),
            "SQS message deleted"
        );

        Ok(())
    }
}

/// Builds [`SqsQueueClient`]s from resolved profiles
#[derive(Clone, Debug, Default)]
pub struct SqsClientFactory {
    fallback_credentials: Option<SharedCredentialsProvider>,
}

impl SqsClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials used when a profile carries none of its own
    pub fn with_fallback_credentials(mut self, provider: SharedCredentialsProvider) -> Self {
        self.fallback_credentials = Some(provider);
        self
    }
}

impl ClientFactory<dyn QueueClient> for SqsClientFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Queue
    }

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<dyn QueueClient>> {
        check_build(profile, self.kind(), kind)?;

        let mut builder = aws_sdk_sqs::Config::builder()
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

        Ok(Arc::new(SqsQueueClient::new(Client::from_conf(builder.build()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_choose_string_or_binary() {
        let mut attributes = BTreeMap::new();
        attributes.insert("trace".to_string(), b"abc".to_vec());
        attributes.insert("raw".to_string(), vec![0xff, 0x00]);

        let converted = to_attributes(&attributes).unwrap().unwrap();
        assert_eq!(converted["trace"].data_type(), STRING_TYPE);
        assert_eq!(converted["trace"].string_value(), Some("abc"));
        assert_eq!(converted["raw"].data_type(), BINARY_TYPE);

        let back = from_attributes(Some(&converted));
        assert_eq!(back, attributes);
    }

    #[test]
    fn test_no_attributes_sends_none() {
        assert!(to_attributes(&BTreeMap::new()).unwrap().is_none());
        assert!(from_attributes(None).is_empty());
    }

    #[test]
    fn test_factory_rejects_object_store_kind() {
        let result = SqsClientFactory::new().build(&Profile::new("us-east-1"), BackendKind::ObjectStore);
        assert!(matches!(result, Err(CirrusError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_factory_rejects_empty_region() {
        let result = SqsClientFactory::new().build(&Profile::default(), BackendKind::Queue);
        assert!(matches!(result, Err(CirrusError::ConfigUnavailable(_))));
    }

    #[tokio::test]
    async fn test_factory_builds_with_endpoint_override() {
        let profile = Profile::new("us-east-1")
            .with_endpoint("http://localhost:4566")
            .with_static_credentials("test", "test", None);
        assert!(SqsClientFactory::new().build(&profile, BackendKind::Queue).is_ok());
    }
}
