//! Object store factories for the buckets tradearc reads from and archives to.
//!
//! The `ObjectStoreFactory` trait is the only way the pipeline reaches object
//! storage. Callers ask for a store scoped to one bucket together with the
//! transport retry budget that store should use; there is no process-wide
//! client.

pub mod cloud;
pub mod local;
pub mod memory;
pub mod paths;

use std::sync::Arc;
use std::time::Duration;

use object_store::{BackoffConfig, ObjectStore, RetryConfig};

pub use cloud::{CloudObjectStoreFactory, S3Options};
pub use local::{LocalFileSystemFactory, TemporaryFileSystemFactory};
pub use memory::InMemoryObjectStoreFactory;

/// Default number of total attempts for a single object store request.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Factory trait for creating ObjectStore instances scoped to a bucket.
#[async_trait::async_trait]
pub trait ObjectStoreFactory: Send + Sync {
    /// Create an ObjectStore for `bucket` whose requests are retried by the
    /// transport according to `retry`.
    async fn create_object_store(
        &self,
        bucket: &str,
        retry: RetryPolicy,
    ) -> Result<Arc<dyn ObjectStore>, object_store::Error>;
}

/// Transport-level retry budget for object store requests.
///
/// `max_attempts` counts the first try, so `max_attempts = 3` means up to two
/// retries with exponential backoff. Retries only cover transient network and
/// service errors, as classified by the object store client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_attempts.saturating_sub(1)
    }

    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            backoff: BackoffConfig::default(),
            max_retries: self.max_retries(),
            retry_timeout: self.timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(3 * 60),
        }
    }
}
