//! Local file system object store factory implementation.
//!
//! Each bucket maps to a subdirectory of the configured root path. This is
//! useful to replay storage events locally without cloud credentials.
//!
//! We also provide a `TemporaryFileSystemFactory` that creates the root
//! directory in a temporary location that is cleaned up when the factory is
//! dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::{Error as ObjectStoreError, ObjectStore, local::LocalFileSystem};
use tempfile::TempDir;

use crate::{ObjectStoreFactory, RetryPolicy};

/// Factory for creating local file system object stores.
///
/// The local file system has no transport, so the retry policy is ignored.
pub struct LocalFileSystemFactory {
    root_path: PathBuf,
}

impl LocalFileSystemFactory {
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self, ObjectStoreError> {
        let canonical_path =
            std::fs::canonicalize(root_path.as_ref()).map_err(|e| ObjectStoreError::Generic {
                store: "LocalFileSystem",
                source: Box::new(e),
            })?;

        Ok(Self {
            root_path: canonical_path,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root_path.join(bucket)
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for LocalFileSystemFactory {
    async fn create_object_store(
        &self,
        bucket: &str,
        _retry: RetryPolicy,
    ) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        if matches!(bucket, "" | "." | "..") || bucket.contains(['/', '\\']) {
            return Err(ObjectStoreError::Generic {
                store: "LocalFileSystem",
                source: format!("invalid bucket name: {bucket:?}").into(),
            });
        }

        let store_path = self.bucket_path(bucket);

        std::fs::create_dir_all(&store_path).map_err(|e| ObjectStoreError::Generic {
            store: "LocalFileSystem",
            source: Box::new(e),
        })?;

        let local_fs = LocalFileSystem::new_with_prefix(store_path)?;

        Ok(Arc::new(local_fs))
    }
}

/// Factory for creating temporary file system object stores.
pub struct TemporaryFileSystemFactory {
    _temp_dir: TempDir,
    local_factory: LocalFileSystemFactory,
}

impl TemporaryFileSystemFactory {
    pub fn new() -> Result<Self, ObjectStoreError> {
        let temp_dir = TempDir::new().map_err(|e| ObjectStoreError::Generic {
            store: "TemporaryFileSystem",
            source: Box::new(e),
        })?;

        let local_factory = LocalFileSystemFactory::new(temp_dir.path())?;

        Ok(Self {
            _temp_dir: temp_dir,
            local_factory,
        })
    }

    pub fn root_path(&self) -> &Path {
        self.local_factory.root_path()
    }

    pub fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.local_factory.bucket_path(bucket)
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for TemporaryFileSystemFactory {
    async fn create_object_store(
        &self,
        bucket: &str,
        retry: RetryPolicy,
    ) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        self.local_factory.create_object_store(bucket, retry).await
    }
}
