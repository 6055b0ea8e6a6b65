//! Object store gateway.
//!
//! The API never touches photo bytes. Clients upload and download directly
//! against the bucket with presigned URLs; this module issues those URLs and
//! performs the few management calls the service needs (delete, bucket
//! provisioning, health).

use crate::config::S3Settings;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client as S3Client,
    config::{Builder as S3ConfigBuilder, Credentials},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    types::{BucketLocationConstraint, CorsConfiguration, CorsRule, CreateBucketConfiguration},
};
use std::{collections::BTreeMap, future::Future, time::Duration};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store call `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("object store call `{op}` failed: {message}")]
    Request { op: &'static str, message: String },
    #[error("invalid presign expiry: {0}")]
    Expiry(String),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// A presigned PUT and the headers the client must send with it.
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Time-limited URL the client can PUT the object body to.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> ObjectStoreResult<PresignedUpload>;

    /// Time-limited URL the client can GET the object from.
    async fn presign_get(&self, key: &str, ttl: Duration) -> ObjectStoreResult<String>;

    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()>;

    /// Succeeds when the photos bucket is reachable.
    async fn health(&self) -> ObjectStoreResult<()>;

    /// Create the photos bucket unless it already exists.
    async fn ensure_bucket(&self) -> ObjectStoreResult<()>;

    /// Allow browsers to PUT/GET against presigned URLs.
    async fn set_bucket_cors(&self) -> ObjectStoreResult<()>;
}

/// S3-compatible implementation (AWS, MinIO, LocalStack).
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    region: String,
    timeout: Duration,
}

impl S3ObjectStore {
    pub async fn new(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));

        if let (Some(access), Some(secret)) = (&settings.access_key, &settings.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                "moments-static",
            ));
        }

        let aws_config = loader.load().await;
        let mut builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        info!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = ?settings.endpoint,
            "object store client initialized"
        );

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            timeout: settings.timeout,
        }
    }

    /// Run an SDK call under the configured deadline.
    async fn bounded<T, E, F>(&self, op: &'static str, fut: F) -> ObjectStoreResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ObjectStoreError::Request {
                op,
                message: DisplayErrorContext(&err).to_string(),
            }),
            Err(_) => Err(ObjectStoreError::Timeout {
                op,
                after: self.timeout,
            }),
        }
    }

    fn presigning(ttl: Duration) -> ObjectStoreResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(|err| ObjectStoreError::Expiry(err.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> ObjectStoreResult<PresignedUpload> {
        let presigned = self
            .bounded(
                "presign_put",
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .content_type(content_type)
                    .presigned(Self::presigning(ttl)?),
            )
            .await?;

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());

        Ok(PresignedUpload {
            url: presigned.uri().to_string(),
            headers,
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn presign_get(&self, key: &str, ttl: Duration) -> ObjectStoreResult<String> {
        let presigned = self
            .bounded(
                "presign_get",
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .presigned(Self::presigning(ttl)?),
            )
            .await?;
        Ok(presigned.uri().to_string())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()> {
        self.bounded(
            "delete_object",
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        )
        .await?;
        debug!(key, "object deleted");
        Ok(())
    }

    async fn health(&self) -> ObjectStoreResult<()> {
        self.bounded(
            "head_bucket",
            self.client.head_bucket().bucket(&self.bucket).send(),
        )
        .await?;
        Ok(())
    }

    async fn ensure_bucket(&self) -> ObjectStoreResult<()> {
        if self.health().await.is_ok() {
            return Ok(());
        }

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if !self.region.is_empty() && self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(_)) => {
                info!(bucket = %self.bucket, "created photos bucket");
                Ok(())
            }
            Ok(Err(err)) => {
                let already_there = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false);
                if already_there {
                    Ok(())
                } else {
                    Err(ObjectStoreError::Request {
                        op: "create_bucket",
                        message: DisplayErrorContext(&err).to_string(),
                    })
                }
            }
            Err(_) => Err(ObjectStoreError::Timeout {
                op: "create_bucket",
                after: self.timeout,
            }),
        }
    }

    async fn set_bucket_cors(&self) -> ObjectStoreResult<()> {
        let invalid = |err: aws_sdk_s3::error::BuildError| ObjectStoreError::Request {
            op: "put_bucket_cors",
            message: err.to_string(),
        };
        let rule = CorsRule::builder()
            .allowed_methods("GET")
            .allowed_methods("PUT")
            .allowed_headers("*")
            .allowed_origins("*")
            .expose_headers("ETag")
            .max_age_seconds(3000)
            .build()
            .map_err(invalid)?;
        let cors = CorsConfiguration::builder()
            .cors_rules(rule)
            .build()
            .map_err(invalid)?;

        self.bounded(
            "put_bucket_cors",
            self.client
                .put_bucket_cors()
                .bucket(&self.bucket)
                .cors_configuration(cors)
                .send(),
        )
        .await?;
        Ok(())
    }
}
