//! Storage notification intake.
//!
//! Turns an object-created notification into the raw batch it points at and
//! runs it through the [`BatchProcessor`].

use std::sync::Arc;

use object_store::path::Path;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use tracing::{error, info};
use tradearc_object_store::{ObjectStoreFactory, RetryPolicy};

use crate::error::{
    DecodeSnafu, EmptyEventSnafu, EventJsonSnafu, FetchSnafu, IntakeError, KeyDecodeSnafu,
    SourceClientSnafu, SourcePathSnafu,
};
use crate::processor::{BatchProcessor, ProcessOutcome};

pub type Result<T, E = IntakeError> = std::result::Result<T, E>;

/// S3 style object notification. Only the fields the intake needs are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageEventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
}

/// Bucket and decoded key of a raw batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl StorageEvent {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context(EventJsonSnafu {})
    }
}

impl ObjectLocation {
    /// Location of the first object in `event`.
    pub fn from_event(event: &StorageEvent) -> Result<Self> {
        let record = event.records.first().context(EmptyEventSnafu {})?;

        Ok(Self {
            bucket: record.s3.bucket.name.clone(),
            key: decode_object_key(&record.s3.object.key)?,
        })
    }
}

/// Decodes a form-encoded object key: `+` is a space, `%XX` are UTF-8 bytes.
pub fn decode_object_key(key: &str) -> Result<String> {
    let spaced = key.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .context(KeyDecodeSnafu { key })
}

pub struct Intake {
    object_store_factory: Arc<dyn ObjectStoreFactory>,
    processor: BatchProcessor,
    retry: RetryPolicy,
}

impl Intake {
    pub fn new(
        object_store_factory: Arc<dyn ObjectStoreFactory>,
        processor: BatchProcessor,
    ) -> Self {
        Self {
            object_store_factory,
            processor,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.processor
    }

    /// Reads the raw batch at `location`: a JSON array of record strings.
    pub async fn fetch_batch(&self, location: &ObjectLocation) -> Result<Vec<String>> {
        let ObjectLocation { bucket, key } = location;

        let path = Path::parse(key).context(SourcePathSnafu { key })?;
        let object_store = self
            .object_store_factory
            .create_object_store(bucket, self.retry)
            .await
            .context(SourceClientSnafu { bucket })?;

        let data = object_store
            .get(&path)
            .await
            .context(FetchSnafu { bucket, key })?
            .bytes()
            .await
            .context(FetchSnafu { bucket, key })?;

        serde_json::from_slice(&data).context(DecodeSnafu { bucket, key })
    }

    /// Processes the raw batch referenced by `event`.
    pub async fn handle_event(&self, event: &StorageEvent) -> Result<ProcessOutcome> {
        let location = ObjectLocation::from_event(event)?;
        let ObjectLocation { bucket, key } = &location;
        info!(bucket, key, "received raw batch");

        let result = match self.fetch_batch(&location).await {
            Ok(raw_records) => self.processor.process(&raw_records).await.map_err(Into::into),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            error!(bucket, key, kind = ?err.kind(), err = ?err, "failed to handle raw batch");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use object_store::{ObjectStore, PutPayload};
    use tradearc_object_store::InMemoryObjectStoreFactory;
    use tradearc_observability::ErrorKind;

    use crate::config::ArchiveConfig;
    use crate::test_utils::{RecordingSink, raw_record};

    fn event(bucket: &str, key: &str) -> StorageEvent {
        let body = serde_json::json!({
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": bucket, "arn": "arn:aws:s3:::raw" },
                    "object": { "key": key, "size": 1024 }
                }
            }]
        });
        StorageEvent::from_slice(body.to_string().as_bytes()).unwrap()
    }

    fn intake(factory: Arc<InMemoryObjectStoreFactory>, sink: Arc<RecordingSink>) -> Intake {
        let config = ArchiveConfig::default().with_bucket("archive");
        Intake::new(factory, BatchProcessor::new(config, sink))
    }

    async fn put(factory: &InMemoryObjectStoreFactory, bucket: &str, key: &str, body: String) {
        factory
            .bucket(bucket)
            .unwrap()
            .put(&Path::from(key), PutPayload::from(Bytes::from(body)))
            .await
            .unwrap();
    }

    #[test]
    fn test_decode_object_key() {
        assert_eq!(decode_object_key("raw/batch.json").unwrap(), "raw/batch.json");
        assert_eq!(
            decode_object_key("raw/my+batch%2B1.json").unwrap(),
            "raw/my batch+1.json"
        );
        assert_eq!(decode_object_key("a%2Fb").unwrap(), "a/b");
        assert_eq!(decode_object_key("caf%C3%A9").unwrap(), "café");
        assert!(matches!(
            decode_object_key("bad%FF").unwrap_err(),
            IntakeError::KeyDecode { .. }
        ));
    }

    #[test]
    fn test_location_from_event() {
        let location =
            ObjectLocation::from_event(&event("raw", "2024/05/01/batch+1.json")).unwrap();
        assert_eq!(
            location,
            ObjectLocation {
                bucket: "raw".to_string(),
                key: "2024/05/01/batch 1.json".to_string(),
            }
        );
    }

    #[test]
    fn test_event_errors() {
        let empty = StorageEvent::from_slice(br#"{"Records": []}"#).unwrap();
        let err = ObjectLocation::from_event(&empty).unwrap_err();
        assert!(matches!(err, IntakeError::EmptyEvent));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = StorageEvent::from_slice(b"{\"Records\": 1}").unwrap_err();
        assert!(matches!(err, IntakeError::EventJson { .. }));
    }

    #[tokio::test]
    async fn test_fetch_batch() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let batch = vec![raw_record(1), raw_record(2)];
        let body = serde_json::to_string(&batch).unwrap();
        put(&factory, "raw", "batch.json", body).await;

        let location = ObjectLocation {
            bucket: "raw".to_string(),
            key: "batch.json".to_string(),
        };
        let fetched = intake(factory, Arc::new(RecordingSink::default()))
            .fetch_batch(&location)
            .await
            .unwrap();

        assert_eq!(fetched, batch);
    }

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let location = ObjectLocation {
            bucket: "raw".to_string(),
            key: "missing.json".to_string(),
        };

        let err = intake(factory, Arc::new(RecordingSink::default()))
            .fetch_batch(&location)
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Fetch { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_undecodable_batch_is_fatal() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let sink = Arc::new(RecordingSink::default());
        put(&factory, "raw", "batch.json", "[1, 2]".to_string()).await;

        let err = intake(factory, sink.clone())
            .handle_event(&event("raw", "batch.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Decode { .. }));
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn test_handle_event() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let sink = Arc::new(RecordingSink::default());
        let batch = vec![raw_record(1), "garbage".to_string(), raw_record(2)];
        let body = serde_json::to_string(&batch).unwrap();
        put(&factory, "raw", "in/batch 1.json", body).await;

        let outcome = intake(factory, sink.clone())
            .handle_event(&event("raw", "in/batch+1.json"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ProcessOutcome::Archived {
                accepted: 2,
                rejected: 1,
                ..
            }
        ));
        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].bucket, "archive");
        assert!(writes[0].key.ends_with(".parquet"));
    }

    #[tokio::test]
    async fn test_archive_failure_propagates() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let sink = Arc::new(RecordingSink::failing());
        let body = serde_json::to_string(&[raw_record(1)]).unwrap();
        put(&factory, "raw", "batch.json", body).await;

        let err = intake(factory, sink)
            .handle_event(&event("raw", "batch.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Process { .. }));
        assert!(err.kind().is_retryable());
    }
}
