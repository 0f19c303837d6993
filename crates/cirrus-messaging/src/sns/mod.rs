//! Notification adapter (publish only)

#[cfg(feature = "messaging-sns")]
pub mod aws;
pub mod client;
#[cfg(feature = "messaging-memory")]
pub mod memory;
pub mod provider;

#[cfg(feature = "messaging-sns")]
pub use aws::{SnsClientFactory, SnsTopicClient};
pub use client::{PublishEntry, TopicClient};
#[cfg(feature = "messaging-memory")]
pub use memory::MemoryTopicClient;
pub use provider::SnsProvider;
