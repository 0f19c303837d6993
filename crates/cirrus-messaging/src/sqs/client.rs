//! Queue transport abstraction

use std::collections::BTreeMap;

use async_trait::async_trait;

use cirrus_core::CirrusResult;

use crate::options::{BatchSendResult, ReceiveOptions};

/// Message as handed to the queue backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Batch entry id; ignored for single sends
    pub id: String,
    pub body: String,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

/// Message as returned by the queue backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

/// Minimal queue operations the SQS provider needs
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Returns the backend message id.
    async fn send_message(&self, queue_url: &str, message: &OutgoingMessage) -> CirrusResult<String>;

    /// At most ten entries per call.
    async fn send_message_batch(
        &self,
        queue_url: &str,
        messages: &[OutgoingMessage],
    ) -> CirrusResult<BatchSendResult>;

    async fn receive_messages(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> CirrusResult<Vec<ReceivedMessage>>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> CirrusResult<()>;
}
