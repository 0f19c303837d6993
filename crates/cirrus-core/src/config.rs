//! Configuration module
//!
//! Environment-driven settings shared by the adapters, and seeding of the family-default
//! profiles into a [`ProfileRegistry`].

use std::env;

use anyhow::Context;

use crate::address::{KeyStyle, TopicHostPolicy};
use crate::backend_types::BackendKind;
use crate::profile::{Profile, ProfileRegistry};

const CLOUD_DOMAIN: &str = "amazonaws.com";
const LISTENER_BACKOFF_MS: u64 = 1000;
const MAX_MESSAGES: i32 = 10;
const WAIT_TIME_SECS: i32 = 0;

/// Backend limits for a single receive call
pub const MAX_MESSAGES_LIMIT: i32 = 10;
pub const WAIT_TIME_LIMIT_SECS: i32 = 20;

/// Region and endpoint override for one backend family
#[derive(Clone, Debug, Default)]
pub struct BackendEndpoint {
    pub region: Option<String>,
    pub endpoint: Option<String>, // Custom endpoint for compatible services (MinIO, LocalStack, etc.)
}

#[derive(Clone, Debug)]
pub struct CirrusConfig {
    pub key_style: KeyStyle,
    pub merge_properties: bool,
    pub cloud_domain: String,
    pub topic_host_policy: TopicHostPolicy,
    pub listener_backoff_ms: u64,
    pub max_messages: i32,
    pub wait_time_secs: i32,
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub s3: BackendEndpoint,
    pub sqs: BackendEndpoint,
    pub sns: BackendEndpoint,
}

impl Default for CirrusConfig {
    fn default() -> Self {
        Self {
            key_style: KeyStyle::default(),
            merge_properties: true,
            cloud_domain: CLOUD_DOMAIN.to_string(),
            topic_host_policy: TopicHostPolicy::default(),
            listener_backoff_ms: LISTENER_BACKOFF_MS,
            max_messages: MAX_MESSAGES,
            wait_time_secs: WAIT_TIME_SECS,
            aws_region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            s3: BackendEndpoint::default(),
            sqs: BackendEndpoint::default(),
            sns: BackendEndpoint::default(),
        }
    }
}

impl CirrusConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let key_style = match non_empty("CIRRUS_KEY_STYLE") {
            Some(v) => v.parse::<KeyStyle>().context("CIRRUS_KEY_STYLE")?,
            None => KeyStyle::default(),
        };

        let topic_host_policy = match non_empty("CIRRUS_TOPIC_HOST_POLICY") {
            Some(v) => v
                .parse::<TopicHostPolicy>()
                .context("CIRRUS_TOPIC_HOST_POLICY")?,
            None => TopicHostPolicy::default(),
        };

        let merge_properties = non_empty("CIRRUS_MERGE_PROPERTIES")
            .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
            .unwrap_or(true);

        let listener_backoff_ms = non_empty("CIRRUS_LISTENER_BACKOFF_MS")
            .unwrap_or_else(|| LISTENER_BACKOFF_MS.to_string())
            .trim()
            .parse::<u64>()
            .unwrap_or(LISTENER_BACKOFF_MS);

        let max_messages = non_empty("CIRRUS_MAX_MESSAGES")
            .unwrap_or_else(|| MAX_MESSAGES.to_string())
            .trim()
            .parse::<i32>()
            .unwrap_or(MAX_MESSAGES);

        let wait_time_secs = non_empty("CIRRUS_WAIT_TIME_SECS")
            .unwrap_or_else(|| WAIT_TIME_SECS.to_string())
            .trim()
            .parse::<i32>()
            .unwrap_or(WAIT_TIME_SECS);

        let backend = |prefix: &str| BackendEndpoint {
            region: non_empty(&format!("{}_REGION", prefix)),
            endpoint: non_empty(&format!("{}_ENDPOINT", prefix)),
        };

        Ok(Self {
            key_style,
            merge_properties,
            cloud_domain: non_empty("CIRRUS_CLOUD_DOMAIN").unwrap_or_else(|| CLOUD_DOMAIN.to_string()),
            topic_host_policy,
            listener_backoff_ms,
            max_messages,
            wait_time_secs,
            aws_region: non_empty("AWS_REGION"),
            aws_access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
            s3: backend("S3"),
            sqs: backend("SQS"),
            sns: backend("SNS"),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.cloud_domain.trim().is_empty() {
            return Err(anyhow::anyhow!("CIRRUS_CLOUD_DOMAIN must not be empty"));
        }

        if self.listener_backoff_ms == 0 {
            return Err(anyhow::anyhow!(
                "CIRRUS_LISTENER_BACKOFF_MS must be greater than 0"
            ));
        }

        if !(1..=MAX_MESSAGES_LIMIT).contains(&self.max_messages) {
            return Err(anyhow::anyhow!(
                "CIRRUS_MAX_MESSAGES must be between 1 and {}",
                MAX_MESSAGES_LIMIT
            ));
        }

        if !(0..=WAIT_TIME_LIMIT_SECS).contains(&self.wait_time_secs) {
            return Err(anyhow::anyhow!(
                "CIRRUS_WAIT_TIME_SECS must be between 0 and {}",
                WAIT_TIME_LIMIT_SECS
            ));
        }

        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            return Err(anyhow::anyhow!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ));
        }

        for (kind, backend) in self.backends() {
            let prefix = kind.default_key().to_uppercase();
            if backend.endpoint.is_some() && self.region_for(kind).is_none() {
                return Err(anyhow::anyhow!(
                    "{}_REGION or AWS_REGION must be set when {}_ENDPOINT is set",
                    prefix,
                    prefix
                ));
            }
        }

        Ok(())
    }

    pub fn backend(&self, kind: BackendKind) -> &BackendEndpoint {
        match kind {
            BackendKind::ObjectStore => &self.s3,
            BackendKind::Queue => &self.sqs,
            BackendKind::Notification => &self.sns,
        }
    }

    /// Family region, falling back to `AWS_REGION`
    pub fn region_for(&self, kind: BackendKind) -> Option<&str> {
        self.backend(kind)
            .region
            .as_deref()
            .or(self.aws_region.as_deref())
    }

    fn backends(&self) -> [(BackendKind, &BackendEndpoint); 3] {
        [
            (BackendKind::ObjectStore, &self.s3),
            (BackendKind::Queue, &self.sqs),
            (BackendKind::Notification, &self.sns),
        ]
    }

    /// Register a family-default profile for every family with a configured region.
    ///
    /// Returns the number of profiles registered.
    pub fn seed_profiles(&self, registry: &ProfileRegistry) -> usize {
        let mut seeded = 0;
        for (kind, backend) in self.backends() {
            let Some(region) = self.region_for(kind) else {
                continue;
            };

            let mut profile = Profile::new(region);
            if let Some(endpoint) = &backend.endpoint {
                profile = profile.with_endpoint(endpoint.clone());
            }
            if let (Some(key_id), Some(secret)) =
                (&self.aws_access_key_id, &self.aws_secret_access_key)
            {
                profile = profile.with_static_credentials(key_id.clone(), secret.clone(), None);
            }

            registry.register(kind.default_key(), profile);
            seeded += 1;
        }

        tracing::info!(seeded, "Seeded family-default profiles from configuration");
        seeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CirrusResult;
    use crate::profile::AmbientConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NoAmbient;

    #[async_trait]
    impl AmbientConfig for NoAmbient {
        async fn load(&self) -> CirrusResult<Profile> {
            Err(crate::error::CirrusError::ConfigUnavailable(
                "no ambient configuration in tests".to_string(),
            ))
        }
    }

    fn config(vars: &[(&str, &str)]) -> Result<CirrusConfig, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CirrusConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.key_style, KeyStyle::Trim);
        assert!(config.merge_properties);
        assert_eq!(config.cloud_domain, "amazonaws.com");
        assert_eq!(config.topic_host_policy, TopicHostPolicy::Topic);
        assert_eq!(config.listener_backoff_ms, 1000);
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.wait_time_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("CIRRUS_KEY_STYLE", "preserve"),
            ("CIRRUS_MERGE_PROPERTIES", "false"),
            ("CIRRUS_TOPIC_HOST_POLICY", "queue"),
            ("CIRRUS_MAX_MESSAGES", "5"),
            ("CIRRUS_WAIT_TIME_SECS", "20"),
            ("SQS_REGION", "eu-central-1"),
        ])
        .unwrap();
        assert_eq!(config.key_style, KeyStyle::PreserveLeadingSlash);
        assert!(!config.merge_properties);
        assert_eq!(config.topic_host_policy, TopicHostPolicy::Queue);
        assert_eq!(config.max_messages, 5);
        assert_eq!(config.wait_time_secs, 20);
        assert_eq!(config.region_for(BackendKind::Queue), Some("eu-central-1"));
        assert_eq!(config.region_for(BackendKind::ObjectStore), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_key_style_is_rejected() {
        let err = config(&[("CIRRUS_KEY_STYLE", "sideways")]).unwrap_err();
        assert!(err.to_string().contains("CIRRUS_KEY_STYLE"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_receive_settings() {
        let config = config(&[("CIRRUS_MAX_MESSAGES", "50")]).unwrap();
        assert!(config.validate().is_err());

        let mut config = CirrusConfig::default();
        config.wait_time_secs = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_region_for_endpoint() {
        let config = config(&[("S3_ENDPOINT", "http://localhost:9000")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("S3_REGION or AWS_REGION"));

        let config = config_with_region();
        assert!(config.validate().is_ok());
    }

    fn config_with_region() -> CirrusConfig {
        config(&[
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("AWS_REGION", "us-east-1"),
        ])
        .unwrap()
    }

    #[test]
    fn test_validate_requires_both_credential_halves() {
        let config = config(&[("AWS_ACCESS_KEY_ID", "AKID")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_seed_profiles() {
        let config = config(&[
            ("AWS_REGION", "us-east-1"),
            ("SNS_REGION", "eu-west-1"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "SECRET"),
        ])
        .unwrap();
        let registry = ProfileRegistry::new(Arc::new(NoAmbient));

        assert_eq!(config.seed_profiles(&registry), 3);

        let s3 = registry.get("s3").unwrap();
        assert_eq!(s3.region(), "us-east-1");
        assert_eq!(s3.endpoint_url(), Some("http://localhost:9000"));
        assert!(s3.credentials().is_some());
        assert_eq!(registry.get("sns").unwrap().region(), "eu-west-1");
        assert_eq!(registry.get("sqs").unwrap().region(), "us-east-1");
    }

    #[test]
    fn test_seed_profiles_skips_families_without_region() {
        let config = config(&[("SQS_REGION", "ap-northeast-1")]).unwrap();
        let registry = ProfileRegistry::new(Arc::new(NoAmbient));
        assert_eq!(config.seed_profiles(&registry), 1);
        assert!(registry.get("s3").is_none());
        assert!(registry.get("sqs").is_some());
    }
}
