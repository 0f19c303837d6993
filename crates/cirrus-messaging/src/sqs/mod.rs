//! Queue adapter
//!
//! [`SqsProvider`] talks to a [`QueueClient`]; the AWS SDK transport and an in-process
//! transport both implement it along with the [`ClientFactory`](cirrus_core::ClientFactory)
//! contract.

#[cfg(feature = "messaging-sqs")]
pub mod aws;
pub mod client;
#[cfg(feature = "messaging-memory")]
pub mod memory;
pub mod provider;

pub use client::{OutgoingMessage, QueueClient, ReceivedMessage};
#[cfg(feature = "messaging-sqs")]
pub use aws::{SqsClientFactory, SqsQueueClient};
#[cfg(feature = "messaging-memory")]
pub use memory::MemoryQueueClient;
pub use provider::SqsProvider;
