//! In-process topic transport that records every publish

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use cirrus_core::{check_build, BackendKind, CirrusError, CirrusResult, ClientFactory, Profile};

use crate::options::{BatchSendResult, BATCH_LIMIT};
use crate::sns::client::{PublishEntry, TopicClient};

/// Topic transport backed by process memory
#[derive(Clone, Default)]
pub struct MemoryTopicClient {
    published: Arc<RwLock<HashMap<String, Vec<PublishEntry>>>>,
    built_regions: Arc<Mutex<Vec<String>>>,
}

impl MemoryTopicClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published to `topic_arn`, in publish order
    pub async fn published(&self, topic_arn: &str) -> Vec<PublishEntry> {
        let published = self.published.read().await;
        published.get(topic_arn).cloned().unwrap_or_default()
    }

    pub fn built_regions(&self) -> Vec<String> {
        self.built_regions
            .lock()
            .map(|regions| regions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TopicClient for MemoryTopicClient {
    async fn publish(&self, topic_arn: &str, entry: &PublishEntry) -> CirrusResult<String> {
        let mut published = self.published.write().await;
        published
            .entry(topic_arn.to_string())
            .or_default()
            .push(entry.clone());
        Ok(Uuid::new_v4().to_string())
    }

    async fn publish_batch(
        &self,
        topic_arn: &str,
        entries: &[PublishEntry],
    ) -> CirrusResult<BatchSendResult> {
        if entries.len() > BATCH_LIMIT {
            return Err(CirrusError::Transport(format!(
                "publish_batch {}: {} entries exceeds the batch limit",
                topic_arn,
                entries.len()
            )));
        }

        let mut published = self.published.write().await;
        published
            .entry(topic_arn.to_string())
            .or_default()
            .extend(entries.iter().cloned());

        Ok(BatchSendResult {
            successful: entries.iter().map(|entry| entry.id.clone()).collect(),
            failed: Vec::new(),
        })
    }
}

impl ClientFactory<dyn TopicClient> for MemoryTopicClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Notification
    }

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<dyn TopicClient>> {
        check_build(profile, self.kind(), kind)?;
        if let Ok(mut regions) = self.built_regions.lock() {
            regions.push(profile.region().to_string());
        }
        Ok(Arc::new(self.clone()))
    }
}
