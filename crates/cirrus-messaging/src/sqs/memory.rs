//! In-process queue transport
//!
//! Received messages move to an in-flight set keyed by a fresh receipt handle and stay there
//! until deleted; there is no visibility timeout, so nothing is redelivered. `WaitTime` is
//! ignored and receives return immediately.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use cirrus_core::{check_build, BackendKind, CirrusError, CirrusResult, ClientFactory, Profile};

use crate::options::{BatchEntryFailure, BatchSendResult, ReceiveOptions};
use crate::sqs::client::{OutgoingMessage, QueueClient, ReceivedMessage};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<ReceivedMessage>,
    in_flight: HashMap<String, ReceivedMessage>,
}

/// Queue transport backed by process memory
#[derive(Clone, Default)]
pub struct MemoryQueueClient {
    queues: Arc<RwLock<HashMap<String, QueueState>>>,
    built_regions: Arc<Mutex<Vec<String>>>,
}

impl MemoryQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regions of every profile a client was built from, in build order
    pub fn built_regions(&self) -> Vec<String> {
        self.built_regions
            .lock()
            .map(|regions| regions.clone())
            .unwrap_or_default()
    }

    /// Messages waiting to be received
    pub async fn pending(&self, queue_url: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(queue_url).map(|q| q.pending.len()).unwrap_or(0)
    }

    /// Messages received but not yet deleted
    pub async fn in_flight(&self, queue_url: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(queue_url).map(|q| q.in_flight.len()).unwrap_or(0)
    }

    fn validate(message: &OutgoingMessage) -> Result<(), String> {
        if message.body.is_empty() {
            Err("message body must not be empty".to_string())
        } else {
            Ok(())
        }
    }

    fn stored(message: &OutgoingMessage) -> ReceivedMessage {
        ReceivedMessage {
            message_id: Uuid::new_v4().to_string(),
            receipt_handle: String::new(),
            body: message.body.clone(),
            attributes: message.attributes.clone(),
        }
    }
}

#[async_trait]
impl QueueClient for MemoryQueueClient {
    async fn send_message(&self, queue_url: &str, message: &OutgoingMessage) -> CirrusResult<String> {
        Self::validate(message)
            .map_err(|reason| CirrusError::Transport(format!("send_message {}: {}", queue_url, reason)))?;

        let stored = Self::stored(message);
        let message_id = stored.message_id.clone();

        let mut queues = self.queues.write().await;
        queues
            .entry(queue_url.to_string())
            .or_default()
            .pending
            .push_back(stored);

        Ok(message_id)
    }

    async fn send_message_batch(
        &self,
        queue_url: &str,
        messages: &[OutgoingMessage],
    ) -> CirrusResult<BatchSendResult> {
        if messages.len() > crate::options::BATCH_LIMIT {
            return Err(CirrusError::Transport(format!(
                "send_message_batch {}: {} entries exceeds the batch limit",
                queue_url,
                messages.len()
            )));
        }

        let mut result = BatchSendResult::default();
        let mut queues = self.queues.write().await;
        let queue = queues.entry(queue_url.to_string()).or_default();

        for message in messages {
            match Self::validate(message) {
                Ok(()) => {
                    queue.pending.push_back(Self::stored(message));
                    result.successful.push(message.id.clone());
                }
                Err(reason) => result.failed.push(BatchEntryFailure {
                    id: message.id.clone(),
                    code: "InvalidParameterValue".to_string(),
                    message: reason,
                    sender_fault: true,
                }),
            }
        }

        Ok(result)
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> CirrusResult<Vec<ReceivedMessage>> {
        let mut queues = self.queues.write().await;
        let Some(queue) = queues.get_mut(queue_url) else {
            return Ok(Vec::new());
        };

        let count = usize::try_from(options.max_messages)
            .unwrap_or(0)
            .min(queue.pending.len());

        let drained: Vec<ReceivedMessage> = queue.pending.drain(..count).collect();
        let mut received = Vec::with_capacity(count);
        for mut message in drained {
            message.receipt_handle = Uuid::new_v4().to_string();
            queue
                .in_flight
                .insert(message.receipt_handle.clone(), message.clone());
            received.push(message);
        }

        Ok(received)
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> CirrusResult<()> {
        let mut queues = self.queues.write().await;
        queues
            .get_mut(queue_url)
            .and_then(|queue| queue.in_flight.remove(receipt_handle))
            .map(|_| ())
            .ok_or_else(|| {
                CirrusError::NotFound(format!("{}: receipt {}", queue_url, receipt_handle))
            })
    }
}

impl ClientFactory<dyn QueueClient> for MemoryQueueClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Queue
    }

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<dyn QueueClient>> {
        check_build(profile, self.kind(), kind)?;
        if let Ok(mut regions) = self.built_regions.lock() {
            regions.push(profile.region().to_string());
        }
        Ok(Arc::new(self.clone()))
    }
}
