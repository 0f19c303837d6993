use std::time::Duration;

use cirrus_core::{CirrusConfig, TopicHostPolicy};

use crate::options::ReceiveOptions;

/// Scheme served by the notification adapter unless configured otherwise
pub const DEFAULT_TOPIC_SCHEME: &str = "sns";

const CLOUD_DOMAIN: &str = "amazonaws.com";
const LISTENER_BACKOFF: Duration = Duration::from_secs(1);

/// Settings shared by the queue and notification adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingSettings {
    /// Domain of managed endpoint hosts (`sqs.<region>.<domain>`)
    pub cloud_domain: String,
    pub topic_host_policy: TopicHostPolicy,
    pub topic_schemes: Vec<String>,
    /// Sleep between listener polls that returned nothing
    pub listener_backoff: Duration,
    pub receive_defaults: ReceiveOptions,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            cloud_domain: CLOUD_DOMAIN.to_string(),
            topic_host_policy: TopicHostPolicy::default(),
            topic_schemes: vec![DEFAULT_TOPIC_SCHEME.to_string()],
            listener_backoff: LISTENER_BACKOFF,
            receive_defaults: ReceiveOptions::default(),
        }
    }
}

impl MessagingSettings {
    pub fn with_cloud_domain(mut self, domain: impl Into<String>) -> Self {
        self.cloud_domain = domain.into();
        self
    }

    pub fn with_topic_host_policy(mut self, policy: TopicHostPolicy) -> Self {
        self.topic_host_policy = policy;
        self
    }

    pub fn with_topic_schemes(mut self, schemes: Vec<String>) -> Self {
        self.topic_schemes = schemes;
        self
    }

    pub fn with_listener_backoff(mut self, backoff: Duration) -> Self {
        self.listener_backoff = backoff;
        self
    }

    pub fn with_receive_defaults(mut self, defaults: ReceiveOptions) -> Self {
        self.receive_defaults = defaults;
        self
    }
}

impl From<&CirrusConfig> for MessagingSettings {
    fn from(config: &CirrusConfig) -> Self {
        Self {
            cloud_domain: config.cloud_domain.clone(),
            topic_host_policy: config.topic_host_policy,
            listener_backoff: Duration::from_millis(config.listener_backoff_ms),
            receive_defaults: ReceiveOptions::new(config.max_messages, config.wait_time_secs),
            ..Default::default()
        }
    }
}
