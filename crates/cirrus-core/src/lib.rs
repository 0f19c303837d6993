//! Core building blocks shared by the cirrus adapters
//!
//! - [`Locator`] parsing and the per-backend address views
//! - layered profile resolution ([`ProfileRegistry`])
//! - the [`ClientFactory`] contract
//! - scheme-keyed provider dispatch ([`ProviderRegistry`])

pub mod address;
pub mod backend_types;
pub mod client;
pub mod config;
pub mod error;
pub mod locator;
pub mod profile;
pub mod registry;

pub use address::{KeyStyle, ObjectAddress, QueueAddress, TopicAddress, TopicHostPolicy, QUEUE_SCHEME};
pub use backend_types::BackendKind;
pub use client::{check_build, ClientFactory};
pub use config::{BackendEndpoint, CirrusConfig};
pub use error::{CirrusError, CirrusResult, LogLevel};
pub use locator::{HostPattern, Locator};
#[cfg(feature = "aws-ambient")]
pub use profile::AwsAmbientConfig;
pub use profile::{AmbientConfig, Profile, ProfileRegistry};
pub use registry::{ProviderRegistry, SchemeProvider};
