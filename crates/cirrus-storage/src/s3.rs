use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::{ByteStream as SdkByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::MetadataDirective;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use cirrus_core::{check_build, BackendKind, CirrusError, CirrusResult, ClientFactory, Profile};

use crate::client::{ByteStream, ObjectClient, ObjectHead, ObjectSummary};

fn to_chrono(value: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// S3 object transport
#[derive(Clone, Debug)]
pub struct S3ObjectClient {
    client: Client,
}

impl S3ObjectClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn transport_error<E: std::fmt::Display>(
        &self,
        operation: &str,
        bucket: &str,
        key: &str,
        error: &E,
        start: Instant,
    ) -> CirrusError {
        tracing::error!(
            error = %error,
            bucket = %bucket,
            key = %key,
            duration_ms = elapsed_ms(start),
            "S3 {} failed",
            operation
        );
        CirrusError::Transport(format!("{} {}/{}: {}", operation, bucket, key, error))
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn get(&self, bucket: &str, key: &str) -> CirrusResult<ByteStream> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    GetObjectError::NoSuchKey(_) => {
                        CirrusError::NotFound(format!("{}/{}", bucket, key))
                    }
                    _ => self.transport_error("get_object", bucket, key, &e, start),
                },
                _ => self.transport_error("get_object", bucket, key, &e, start),
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = response.content_length().unwrap_or(0),
            duration_ms = elapsed_ms(start),
            "S3 get_object successful"
        );

        let stream = futures::stream::unfold(Some(response.body), |state| async move {
            let mut body = state?;
            match body.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), Some(body))),
                Some(Err(e)) => Some((Err(CirrusError::Transport(e.to_string())), None)),
                None => None,
            }
        });

        Ok(Box::pin(stream))
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> CirrusResult<()> {
        let start = Instant::now();
        let size = body.len() as u64;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.transport_error("put_object", bucket, key, &e, start))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = elapsed_ms(start),
            "S3 put_object successful"
        );

        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> CirrusResult<ObjectHead> {
        let start = Instant::now();

        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => {
                        CirrusError::NotFound(format!("{}/{}", bucket, key))
                    }
                    _ => self.transport_error("head_object", bucket, key, &e, start),
                },
                _ => self.transport_error("head_object", bucket, key, &e, start),
            })?;

        Ok(ObjectHead {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            last_modified: response.last_modified().and_then(to_chrono),
            metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> CirrusResult<Vec<ObjectSummary>> {
        let start = Instant::now();
        let mut summaries = Vec::new();

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| self.transport_error("list_objects_v2", bucket, prefix, &e, start))?;

            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                summaries.push(ObjectSummary {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }
        }

        tracing::info!(
            bucket = %bucket,
            prefix = %prefix,
            objects = summaries.len(),
            duration_ms = elapsed_ms(start),
            "S3 list_objects_v2 successful"
        );

        Ok(summaries)
    }

    async fn delete(&self, bucket: &str, key: &str) -> CirrusResult<()> {
        let start = Instant::now();

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.transport_error("delete_object", bucket, key, &e, start))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = elapsed_ms(start),
            "S3 delete_object successful"
        );

        Ok(())
    }

    async fn replace_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> CirrusResult<()> {
        let start = Instant::now();

        // URL-encode the copy source per AWS S3 API requirements
        let copy_source = format!("{}/{}", bucket, urlencoding::encode(key));

        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(&copy_source)
            .key(key)
            .metadata_directive(MetadataDirective::Replace)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| self.transport_error("copy_object", bucket, key, &e, start))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = elapsed_ms(start),
            "S3 metadata replace successful"
        );

        Ok(())
    }
}

/// Builds [`S3ObjectClient`]s from resolved profiles
#[derive(Clone, Debug, Default)]
pub struct S3ClientFactory {
    fallback_credentials: Option<SharedCredentialsProvider>,
}

impl S3ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials used when a profile carries none of its own
    pub fn with_fallback_credentials(mut self, provider: SharedCredentialsProvider) -> Self {
        self.fallback_credentials = Some(provider);
        self
    }
}

impl ClientFactory<dyn ObjectClient> for S3ClientFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<dyn ObjectClient>> {
        check_build(profile, self.kind(), kind)?;

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(profile.region().to_string()));

        if let Some(provider) = profile
            .credentials()
            .cloned()
            .or_else(|| self.fallback_credentials.clone())
        {
            builder = builder.credentials_provider(provider);
        }

        // Use path-style addressing for S3-compatible providers (required for MinIO, etc.)
        if let Some(endpoint) = profile.endpoint_url() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Arc::new(S3ObjectClient::new(Client::from_conf(builder.build()))))
    }
}
