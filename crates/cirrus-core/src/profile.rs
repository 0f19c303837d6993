//! Region/credential profiles and the layered profile resolver
//!
//! A [`ProfileRegistry`] is created once at startup and shared by every adapter. Profiles
//! are registered under lookup keys derived from locators; resolution walks from the most
//! specific key to the least specific one and finally falls back to the ambient
//! configuration chain:
//!
//! 1. `authority` + `/` + the full path of the locator (`endpoint//bucket/key`)
//! 2. `authority`
//! 3. the backend family key (`s3`, `sqs`, `sns`)
//! 4. the ambient default (loaded once, then reused)
//!
//! The first profile with a non-empty region wins.

use std::sync::Arc;

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::backend_types::BackendKind;
use crate::error::{CirrusError, CirrusResult};
use crate::locator::Locator;

/// Separator between the authority and the path in exact lookup keys
pub const KEY_SEPARATOR: &str = "/";

const STATIC_CREDENTIALS_PROVIDER: &str = "cirrus-static";

/// Region and credentials used to build one backend client
#[derive(Debug, Clone, Default)]
pub struct Profile {
    region: String,
    endpoint_url: Option<String>,
    credentials: Option<SharedCredentialsProvider>,
}

impl Profile {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    /// Custom endpoint for S3/SQS/SNS-compatible services (MinIO, LocalStack, ...)
    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_credentials_provider(mut self, provider: SharedCredentialsProvider) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn with_static_credentials(
        self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            STATIC_CREDENTIALS_PROVIDER,
        );
        self.with_credentials_provider(SharedCredentialsProvider::new(credentials))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn credentials(&self) -> Option<&SharedCredentialsProvider> {
        self.credentials.as_ref()
    }

    pub fn has_region(&self) -> bool {
        !self.region.trim().is_empty()
    }

    /// Structural validation performed before a client is built from this profile.
    pub fn validate(&self, kind: BackendKind) -> CirrusResult<()> {
        if !self.has_region() {
            return Err(CirrusError::ConfigUnavailable(format!(
                "profile for {} has an empty region",
                kind
            )));
        }
        Ok(())
    }
}

/// Last-resort source of region and credentials
#[async_trait]
pub trait AmbientConfig: Send + Sync {
    async fn load(&self) -> CirrusResult<Profile>;
}

/// Ambient configuration from the AWS default provider chain
/// (environment, shared config files, instance metadata).
#[cfg(feature = "aws-ambient")]
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsAmbientConfig;

#[cfg(feature = "aws-ambient")]
#[async_trait]
impl AmbientConfig for AwsAmbientConfig {
    async fn load(&self) -> CirrusResult<Profile> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;

        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_string())
            .ok_or_else(|| {
                CirrusError::ConfigUnavailable(
                    "no region found in the ambient AWS configuration".to_string(),
                )
            })?;

        let mut profile = Profile::new(region);
        if let Some(endpoint) = sdk_config.endpoint_url() {
            profile = profile.with_endpoint(endpoint);
        }
        if let Some(provider) = sdk_config.credentials_provider() {
            profile = profile.with_credentials_provider(provider);
        }
        Ok(profile)
    }
}

/// Shared lookup-key -> profile table with layered resolution
pub struct ProfileRegistry {
    profiles: DashMap<String, Profile>,
    ambient: Arc<dyn AmbientConfig>,
    ambient_profile: OnceCell<Profile>,
}

impl ProfileRegistry {
    pub fn new(ambient: Arc<dyn AmbientConfig>) -> Self {
        Self {
            profiles: DashMap::new(),
            ambient,
            ambient_profile: OnceCell::new(),
        }
    }

    /// Registry falling back to the AWS default provider chain
    #[cfg(feature = "aws-ambient")]
    pub fn with_aws_ambient() -> Self {
        Self::new(Arc::new(AwsAmbientConfig))
    }

    /// Register (or replace) the profile stored under `key`.
    pub fn register(&self, key: impl Into<String>, profile: Profile) -> Option<Profile> {
        let key = key.into();
        tracing::debug!(key = %key, region = %profile.region(), "Registering profile");
        self.profiles.insert(key, profile)
    }

    /// Drop the profile stored under `key`; later resolutions fall through to broader keys.
    pub fn remove(&self, key: &str) -> Option<Profile> {
        self.profiles.remove(key).map(|(_, profile)| profile)
    }

    pub fn get(&self, key: &str) -> Option<Profile> {
        self.profiles.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Candidate lookup keys for `locator`, most specific first.
    pub fn lookup_keys(locator: &Locator, kind: BackendKind) -> Vec<String> {
        let host = locator.host();
        let path = locator.path();

        // the path keeps its leading '/', so the separator doubles it
        let exact = if path.is_empty() {
            host.to_string()
        } else {
            format!("{}{}{}", host, KEY_SEPARATOR, path)
        };

        let mut keys: Vec<String> = Vec::with_capacity(3);
        for key in [exact, host.to_string(), kind.default_key().to_string()] {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Resolve the profile for `locator`.
    ///
    /// Fails only when every registered tier is missing and the ambient chain itself fails.
    pub async fn resolve(&self, locator: &Locator, kind: BackendKind) -> CirrusResult<Profile> {
        for key in Self::lookup_keys(locator, kind) {
            if let Some(profile) = self.get(&key) {
                if profile.has_region() {
                    tracing::debug!(
                        locator = %locator,
                        key = %key,
                        region = %profile.region(),
                        "Resolved registered profile"
                    );
                    return Ok(profile);
                }
            }
        }

        let profile = self
            .ambient_profile
            .get_or_try_init(|| async {
                let profile = self.ambient.load().await?;
                if !profile.has_region() {
                    return Err(CirrusError::ConfigUnavailable(
                        "ambient configuration has no region".to_string(),
                    ));
                }
                tracing::info!(region = %profile.region(), "Loaded ambient profile");
                Ok(profile)
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, locator = %locator, "Ambient profile unavailable");
                match e {
                    CirrusError::ConfigUnavailable(_) => e,
                    other => CirrusError::ConfigUnavailable(other.to_string()),
                }
            })?;

        tracing::debug!(locator = %locator, region = %profile.region(), "Resolved ambient profile");
        Ok(profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAmbient {
        region: Option<&'static str>,
        loads: AtomicUsize,
    }

    impl CountingAmbient {
        fn new(region: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                region,
                loads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AmbientConfig for CountingAmbient {
        async fn load(&self) -> CirrusResult<Profile> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match self.region {
                Some(region) => Ok(Profile::new(region)),
                None => Err(CirrusError::Transport("metadata endpoint unreachable".to_string())),
            }
        }
    }

    fn locator() -> Locator {
        Locator::parse("s3://endpoint/bucket1/folder/file.txt").unwrap()
    }

    #[test]
    fn test_lookup_keys_order() {
        let keys = ProfileRegistry::lookup_keys(&locator(), BackendKind::ObjectStore);
        assert_eq!(
            keys,
            vec![
                "endpoint//bucket1/folder/file.txt".to_string(),
                "endpoint".to_string(),
                "s3".to_string()
            ]
        );
    }

    #[test]
    fn test_exact_key_keeps_full_queue_path() {
        let locator =
            Locator::parse("https://sqs.us-east-1.amazonaws.com/123456789012/my-queue").unwrap();
        let keys = ProfileRegistry::lookup_keys(&locator, BackendKind::Queue);
        assert_eq!(keys[0], "sqs.us-east-1.amazonaws.com//123456789012/my-queue");
        assert_eq!(keys[1], "sqs.us-east-1.amazonaws.com");
    }

    #[tokio::test]
    async fn test_slash_trimmed_key_is_not_exact() {
        let registry = ProfileRegistry::new(CountingAmbient::new(Some("ambient-1")));
        registry.register("endpoint/bucket1/folder/file.txt", Profile::new("trimmed-1"));
        registry.register("endpoint", Profile::new("host-1"));

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "host-1");
    }

    #[test]
    fn test_lookup_keys_skip_duplicates() {
        let locator = Locator::parse("s3://endpoint").unwrap();
        let keys = ProfileRegistry::lookup_keys(&locator, BackendKind::ObjectStore);
        assert_eq!(keys, vec!["endpoint".to_string(), "s3".to_string()]);
    }

    #[tokio::test]
    async fn test_exact_key_wins() {
        let registry = ProfileRegistry::new(CountingAmbient::new(Some("ambient-1")));
        registry.register("endpoint//bucket1/folder/file.txt", Profile::new("exact-1"));
        registry.register("endpoint", Profile::new("host-1"));
        registry.register("s3", Profile::new("family-1"));

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "exact-1");
    }

    #[tokio::test]
    async fn test_authority_beats_family_default() {
        let registry = ProfileRegistry::new(CountingAmbient::new(Some("ambient-1")));
        registry.register("endpoint", Profile::new("host-1"));
        registry.register("s3", Profile::new("family-1"));

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "host-1");
    }

    #[tokio::test]
    async fn test_family_default_is_per_backend() {
        let registry = ProfileRegistry::new(CountingAmbient::new(Some("ambient-1")));
        registry.register("sqs", Profile::new("queue-1"));

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "ambient-1");

        let profile = registry.resolve(&locator(), BackendKind::Queue).await.unwrap();
        assert_eq!(profile.region(), "queue-1");
    }

    #[tokio::test]
    async fn test_empty_region_is_skipped() {
        let registry = ProfileRegistry::new(CountingAmbient::new(Some("ambient-1")));
        registry.register("endpoint", Profile::new(""));
        registry.register("s3", Profile::new("family-1"));

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "family-1");
    }

    #[tokio::test]
    async fn test_ambient_fallback_is_loaded_once() {
        let ambient = CountingAmbient::new(Some("ambient-1"));
        let registry = ProfileRegistry::new(ambient.clone());

        for _ in 0..3 {
            let profile = registry
                .resolve(&locator(), BackendKind::ObjectStore)
                .await
                .unwrap();
            assert_eq!(profile.region(), "ambient-1");
        }
        assert_eq!(ambient.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ambient_failure_is_config_unavailable() {
        let ambient = CountingAmbient::new(None);
        let registry = ProfileRegistry::new(ambient.clone());

        let err = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap_err();
        assert!(matches!(err, CirrusError::ConfigUnavailable(_)));

        // Failures are not memoised.
        let _ = registry.resolve(&locator(), BackendKind::ObjectStore).await;
        assert_eq!(ambient.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_registered_profile_never_touches_ambient() {
        let ambient = CountingAmbient::new(None);
        let registry = ProfileRegistry::new(ambient.clone());
        registry.register("s3", Profile::new("family-1"));

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "family-1");
        assert_eq!(ambient.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_falls_through() {
        let registry = ProfileRegistry::new(CountingAmbient::new(Some("ambient-1")));
        registry.register("endpoint", Profile::new("host-1"));
        registry.register("s3", Profile::new("family-1"));
        assert_eq!(registry.len(), 2);

        let removed = registry.remove("endpoint").unwrap();
        assert_eq!(removed.region(), "host-1");

        let profile = registry
            .resolve(&locator(), BackendKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(profile.region(), "family-1");
    }

    #[tokio::test]
    async fn test_concurrent_resolution() {
        let ambient = CountingAmbient::new(Some("ambient-1"));
        let registry = Arc::new(ProfileRegistry::new(ambient.clone()));

        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    registry.register(format!("host-{}", i), Profile::new(format!("r-{}", i)));
                }
                let locator = Locator::parse(&format!("s3://host-{}/bucket/key", i)).unwrap();
                registry
                    .resolve(&locator, BackendKind::ObjectStore)
                    .await
                    .unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let profile = handle.await.unwrap();
            if i % 4 == 0 {
                assert_eq!(profile.region(), format!("r-{}", i));
            } else {
                assert_eq!(profile.region(), "ambient-1");
            }
        }
        assert_eq!(ambient.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_profile_validate() {
        assert!(Profile::new("us-east-1")
            .validate(BackendKind::Queue)
            .is_ok());
        let err = Profile::new("  ").validate(BackendKind::Queue).unwrap_err();
        assert!(matches!(err, CirrusError::ConfigUnavailable(_)));
    }

    #[test]
    fn test_profile_builders() {
        let profile = Profile::new("eu-west-1")
            .with_endpoint("http://localhost:4566")
            .with_static_credentials("AKID", "SECRET", None);
        assert_eq!(profile.region(), "eu-west-1");
        assert_eq!(profile.endpoint_url(), Some("http://localhost:4566"));
        assert!(profile.credentials().is_some());
    }
}
