//! S3 remote files.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::Builder as S3ConfigBuilder,
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::Deserialize;

use super::{Download, StorageBackend};
use crate::error::{ServerError, ServerResult};
use hatch::bucket::Bucket;
use hatch::hash::Hash;

/// The S3 remote file storage backend.
#[derive(Debug)]
pub struct S3Backend {
    client: Client,
    config: S3StorageConfig,
}

/// S3 remote file storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3StorageConfig {
    /// The AWS region.
    region: String,

    /// Custom S3 endpoint.
    ///
    /// Set this if you are using an S3-compatible object storage (e.g., Minio).
    endpoint: Option<String>,

    /// Prefix of the S3 bucket names.
    ///
    /// Each logical bucket maps to an S3 bucket named `<prefix><bucket>`,
    /// for example `hatch-projects`.
    #[serde(rename = "bucket-prefix")]
    #[serde(default)]
    bucket_prefix: String,

    /// S3 credentials.
    ///
    /// If not specified, it's read from the `AWS_ACCESS_KEY_ID` and
    /// `AWS_SECRET_ACCESS_KEY` environment variables.
    credentials: Option<S3CredentialsConfig>,
}

/// S3 credential configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3CredentialsConfig {
    /// Access key ID.
    #[serde(rename = "access-key-id")]
    access_key_id: String,

    /// Secret access key.
    #[serde(rename = "secret-access-key")]
    secret_access_key: String,
}

impl S3Backend {
    pub async fn new(config: S3StorageConfig) -> ServerResult<Self> {
        let s3_config = Self::config_builder(&config)
            .await?
            .region(Region::new(config.region.to_owned()))
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            config,
        })
    }

    async fn config_builder(config: &S3StorageConfig) -> ServerResult<S3ConfigBuilder> {
        let shared_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = S3ConfigBuilder::from(&shared_config);

        if let Some(credentials) = &config.credentials {
            builder = builder.credentials_provider(Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None,
                None,
                "s3",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(builder)
    }

    fn bucket_name(&self, bucket: Bucket) -> String {
        format!("{}{}", self.config.bucket_prefix, bucket.as_str())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn put_file(
        &self,
        bucket: Bucket,
        key: &Hash,
        path: &Path,
        content_type: &str,
    ) -> ServerResult<u64> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(ServerError::storage_error)?;

        let put_object = self
            .client
            .put_object()
            .bucket(self.bucket_name(bucket))
            .key(key.to_base16())
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(ServerError::storage_error)?;

        tracing::debug!("put_object -> {:#?}", put_object);

        // Report what the store actually holds
        self.stat_file(bucket, key).await?.ok_or_else(|| {
            ServerError::StorageError(anyhow::anyhow!(
                "Object {} vanished after upload",
                key.to_base16()
            ))
        })
    }

    async fn get_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Download> {
        let output = self
            .client
            .get_object()
            .bucket(self.bucket_name(bucket))
            .key(key.to_base16())
            .send()
            .await
            .map_err(ServerError::storage_error)?;

        let size = output.content_length().unwrap_or_default().max(0) as u64;

        Ok(Download {
            stream: Box::new(output.body.into_async_read()),
            size,
        })
    }

    async fn stat_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Option<u64>> {
        let res = self
            .client
            .head_object()
            .bucket(self.bucket_name(bucket))
            .key(key.to_base16())
            .send()
            .await;

        match res {
            Ok(output) => Ok(Some(output.content_length().unwrap_or_default().max(0) as u64)),
            Err(e) => {
                if e.as_service_error().map(|e| e.is_not_found()) == Some(true) {
                    Ok(None)
                } else {
                    Err(ServerError::storage_error(e))
                }
            }
        }
    }
}
