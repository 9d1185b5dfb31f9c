//! In-process object store factory.
//!
//! Every bucket is an `InMemory` store that lives as long as the factory.
//! Creating the same bucket twice returns the same store, so data written
//! through one handle is visible through the next.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use object_store::{Error as ObjectStoreError, ObjectStore, memory::InMemory};

use crate::{ObjectStoreFactory, RetryPolicy};

#[derive(Default)]
pub struct InMemoryObjectStoreFactory {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
    requested: Mutex<Vec<(String, RetryPolicy)>>,
}

impl InMemoryObjectStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `bucket`, creating it if needed.
    pub fn bucket(&self, bucket: &str) -> Result<Arc<InMemory>, ObjectStoreError> {
        let mut buckets = self.buckets.lock().map_err(|_| poisoned())?;
        let store = buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()));
        Ok(store.clone())
    }

    /// Bucket names and retry policies of every store handed out so far.
    pub fn requested_stores(&self) -> Vec<(String, RetryPolicy)> {
        self.requested
            .lock()
            .map(|requested| requested.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for InMemoryObjectStoreFactory {
    async fn create_object_store(
        &self,
        bucket: &str,
        retry: RetryPolicy,
    ) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        let store = self.bucket(bucket)?;

        self.requested
            .lock()
            .map_err(|_| poisoned())?
            .push((bucket.to_string(), retry));

        Ok(store)
    }
}

fn poisoned() -> ObjectStoreError {
    ObjectStoreError::Generic {
        store: "InMemory",
        source: "poisoned lock".into(),
    }
}
