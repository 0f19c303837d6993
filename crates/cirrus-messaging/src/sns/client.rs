//! Topic transport abstraction

use std::collections::BTreeMap;

use async_trait::async_trait;

use cirrus_core::CirrusResult;

use crate::options::BatchSendResult;

/// One notification as handed to the topic backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEntry {
    /// Batch entry id; ignored for single publishes
    pub id: String,
    pub message: String,
    pub subject: Option<String>,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

/// Publish-only operations the SNS provider needs
#[async_trait]
pub trait TopicClient: Send + Sync {
    /// Returns the backend message id.
    async fn publish(&self, topic_arn: &str, entry: &PublishEntry) -> CirrusResult<String>;

    /// At most ten entries per call.
    async fn publish_batch(
        &self,
        topic_arn: &str,
        entries: &[PublishEntry],
    ) -> CirrusResult<BatchSendResult>;
}
