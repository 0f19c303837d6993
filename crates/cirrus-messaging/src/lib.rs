//! Cirrus Messaging Library
//!
//! Queue and notification adapters behind one [`MessagingProvider`] capability trait.
//!
//! - [`sqs`]: `https://sqs.<region>.<domain>/<account>/<queue>`; send, receive, listen and
//!   acknowledge
//! - [`sns`]: `sns://sns.<region>.<domain>/<account>/<topic>`; publish only
//!
//! [`MessagingManager`] dispatches on the locator scheme.

pub(crate) mod listener;
pub mod manager;
pub mod message;
pub mod options;
pub mod provider;
pub mod settings;
pub mod sns;
pub mod sqs;

// Re-export commonly used types
pub use manager::MessagingManager;
pub use message::{Message, MESSAGE_ID_HEADER, RECEIPT_HEADER};
pub use options::{
    BatchEntryFailure, BatchOutcome, BatchSendResult, Capabilities, MessagingOption,
    ReceiveOptions, BATCH_LIMIT,
};
pub use provider::{Listener, MessagingProvider};
pub use settings::{MessagingSettings, DEFAULT_TOPIC_SCHEME};
pub use sns::{PublishEntry, SnsProvider, TopicClient};
pub use sqs::{OutgoingMessage, QueueClient, ReceivedMessage, SqsProvider};
