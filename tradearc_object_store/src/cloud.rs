//! Production object store factory backed by AWS S3.
//!
//! Credentials and the default region come from the standard AWS environment
//! (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`, ...). An
//! explicit endpoint turns the factory into an S3-compatible client, for
//! example for MinIO.

use std::sync::Arc;

use object_store::{
    Error as ObjectStoreError, ObjectStore,
    aws::{AmazonS3Builder, S3CopyIfNotExists},
};
use snafu::Snafu;
use tracing::debug;
use tradearc_observability::ErrorKind;

use crate::{ObjectStoreFactory, RetryPolicy};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to create S3 object store for bucket {bucket}"))]
    Creation {
        bucket: String,
        source: ObjectStoreError,
    },

    #[snafu(display("Invalid bucket name: {bucket:?}"))]
    InvalidBucket { bucket: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options shared by all stores created by a `CloudObjectStoreFactory`.
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

/// Factory for S3 and S3-compatible object stores.
///
/// A new client is built for every call, so each invocation gets the retry
/// budget it asked for. Clients share no state besides the connection pool of
/// the underlying HTTP client.
pub struct CloudObjectStoreFactory {
    options: S3Options,
}

impl CloudObjectStoreFactory {
    pub fn new(options: S3Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &S3Options {
        &self.options
    }

    fn create_s3_store(&self, bucket: &str, retry: RetryPolicy) -> Result<Arc<dyn ObjectStore>> {
        if bucket.is_empty() {
            return InvalidBucketSnafu { bucket }.fail();
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_retry(retry.to_retry_config())
            .with_copy_if_not_exists(S3CopyIfNotExists::Multipart);

        if let Some(region) = &self.options.region {
            builder = builder.with_region(region);
        }

        if let Some(endpoint) = &self.options.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(self.options.allow_http);
        }

        debug!(
            bucket,
            max_attempts = retry.max_attempts,
            endpoint = ?self.options.endpoint,
            "Creating S3 object store"
        );

        let store = builder.build().map_err(|source| Error::Creation {
            bucket: bucket.to_string(),
            source,
        })?;

        Ok(Arc::new(store))
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for CloudObjectStoreFactory {
    async fn create_object_store(
        &self,
        bucket: &str,
        retry: RetryPolicy,
    ) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        self.create_s3_store(bucket, retry)
            .map_err(ObjectStoreError::from)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Creation { .. } => ErrorKind::Configuration,
            Self::InvalidBucket { .. } => ErrorKind::Validation,
        }
    }
}

impl From<Error> for ObjectStoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Creation { source, .. } => source,
            err @ Error::InvalidBucket { .. } => ObjectStoreError::Generic {
                store: "CloudObjectStoreFactory",
                source: Box::new(err),
            },
        }
    }
}
