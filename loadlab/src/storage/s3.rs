//! Amazon S3 object store
//!
//! Credentials come from the default AWS provider chain (environment, profile, instance role).
//! `endpoint_url` and `force_path_style` allow pointing at S3-compatible stores.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, error::DisplayErrorContext, error::SdkError, primitives::ByteStream};

use super::{ObjectStore, PutObject, Result, StorageError};
use crate::config::StorageConfig;

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client for the configured region (and custom endpoint, if any)
    pub async fn from_config(config: &StorageConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint.as_str().trim_end_matches('/'));
        }

        tracing::info!(
            region = %config.region,
            bucket = %config.bucket,
            endpoint = ?config.endpoint_url.as_ref().map(|u| u.as_str()),
            "S3 object store configured"
        );

        Self::new(Client::from_conf(builder.build()))
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => StorageError::Unavailable(message),
        _ => StorageError::Api(message),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(skip_all, fields(bucket = %object.bucket, key = %object.key))]
    async fn put_object(&self, object: PutObject) -> Result<()> {
        let size = object.body.len();

        self.client
            .put_object()
            .bucket(object.bucket)
            .key(object.key)
            .content_type(object.content_type)
            .body(ByteStream::from(object.body))
            .send()
            .await
            .map_err(map_sdk_error)?;

        tracing::info!(bytes = size, "Object stored in S3");
        Ok(())
    }
}
