//! Archive writer: turns an accepted batch into one object in storage.
//!
//! A write walks `Idle -> Coercing -> Serializing -> Uploading` and ends in
//! `Done` or `Failed`. Retries happen only inside the object store transport,
//! bounded by the attempt budget of each write.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytesize::ByteSize;
use object_store::{PutOptions, PutPayload, path::Path};
use snafu::ResultExt;
use tracing::{debug, error, info, warn};
use tradearc_object_store::{ObjectStoreFactory, RetryPolicy};

use crate::encode::{ArchiveEncoder, ArchiveFormat};
use crate::error::{ObjectStoreClientSnafu, PathSnafu, Result, UploadSnafu};
use crate::table::ArchiveInput;

/// Destination of archived batches.
#[async_trait::async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Archives `input` as `format` under `key` in `bucket`, making at most
    /// `max_attempts` upload attempts.
    ///
    /// Empty input and unknown formats are reported as skipped, not as errors.
    async fn write(
        &self,
        input: ArchiveInput,
        bucket: &str,
        key: &str,
        format: &str,
        max_attempts: usize,
    ) -> Result<WriteOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { num_rows: usize, size: ByteSize },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    Coercing,
    Serializing,
    Uploading,
    Done,
    Failed,
}

pub struct ArchiveWriter {
    object_store_factory: Arc<dyn ObjectStoreFactory>,
    encoder: ArchiveEncoder,
    retry_timeout: Duration,
}

impl ArchiveWriter {
    pub fn new(object_store_factory: Arc<dyn ObjectStoreFactory>) -> Self {
        Self {
            object_store_factory,
            encoder: ArchiveEncoder::default(),
            retry_timeout: RetryPolicy::default().timeout,
        }
    }

    /// Upper bound on the time spent retrying one upload.
    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = retry_timeout;
        self
    }

    pub fn with_encoder(mut self, encoder: ArchiveEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    async fn run(
        &self,
        state: &mut WriteState,
        input: ArchiveInput,
        bucket: &str,
        key: &str,
        format: &str,
        max_attempts: usize,
    ) -> Result<WriteOutcome> {
        state.advance(WriteState::Coercing, bucket, key);
        let path = Path::parse(key).context(PathSnafu { key })?;
        let batch = input.into_record_batch()?;

        if batch.num_rows() == 0 {
            warn!(bucket, key, "batch has no rows, nothing to archive");
            return Ok(WriteOutcome::Skipped(SkipReason::Empty));
        }

        let Ok(format) = format.parse::<ArchiveFormat>() else {
            warn!(bucket, key, format, "unsupported archive format, nothing to archive");
            return Ok(WriteOutcome::Skipped(SkipReason::UnsupportedFormat(
                format.to_string(),
            )));
        };

        state.advance(WriteState::Serializing, bucket, key);
        let archive = self.encoder.encode(&batch, format)?;

        state.advance(WriteState::Uploading, bucket, key);
        let retry = RetryPolicy::new(max_attempts).with_timeout(self.retry_timeout);
        let object_store = self
            .object_store_factory
            .create_object_store(bucket, retry)
            .await
            .context(ObjectStoreClientSnafu { bucket })?;

        let size = archive.size();
        object_store
            .put_opts(
                &path,
                PutPayload::from_bytes(archive.data),
                PutOptions::default(),
            )
            .await
            .context(UploadSnafu { bucket, key })?;

        info!(
            bucket,
            key,
            %format,
            num_rows = archive.num_rows,
            size = %size,
            "archived batch"
        );

        Ok(WriteOutcome::Written {
            num_rows: archive.num_rows,
            size,
        })
    }
}

#[async_trait::async_trait]
impl ArchiveSink for ArchiveWriter {
    async fn write(
        &self,
        input: ArchiveInput,
        bucket: &str,
        key: &str,
        format: &str,
        max_attempts: usize,
    ) -> Result<WriteOutcome> {
        let mut state = WriteState::Idle;

        match self
            .run(&mut state, input, bucket, key, format, max_attempts)
            .await
        {
            Ok(outcome) => {
                state.advance(WriteState::Done, bucket, key);
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    severity = "critical",
                    bucket,
                    key,
                    state = %state,
                    kind = ?err.kind(),
                    err = ?err,
                    "failed to archive batch"
                );
                state.advance(WriteState::Failed, bucket, key);
                Err(err)
            }
        }
    }
}

impl WriteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Coercing => "coercing",
            Self::Serializing => "serializing",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    fn advance(&mut self, next: WriteState, bucket: &str, key: &str) {
        *self = next;
        debug!(bucket, key, state = %next, "archive writer state");
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use arrow::array::{Array, AsArray, RecordBatch};
    use arrow::csv::ReaderBuilder;
    use arrow::datatypes::TimestampMicrosecondType;
    use object_store::ObjectStore;
    use serde_json::json;
    use tradearc_object_store::{DEFAULT_MAX_ATTEMPTS, InMemoryObjectStoreFactory};

    use crate::error::ArchiveError;
    use crate::record::FieldValue;
    use crate::table::trade_schema;
    use crate::test_utils::{FailingObjectStoreFactory, created_at, sample_record};

    fn writer(factory: Arc<InMemoryObjectStoreFactory>) -> ArchiveWriter {
        ArchiveWriter::new(factory)
    }

    async fn read_csv(factory: &InMemoryObjectStoreFactory, key: &str) -> RecordBatch {
        let data = factory
            .bucket("archive")
            .unwrap()
            .get(&Path::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let mut reader = ReaderBuilder::new(trade_schema())
            .with_header(true)
            .build(Cursor::new(data.to_vec()))
            .unwrap();
        reader.next().unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_write_csv_to_bucket() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let rows = vec![sample_record(1), sample_record(2)];

        let outcome = writer(factory.clone())
            .write(rows.into(), "archive", "trades_x.csv", "csv", DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap();

        let (num_rows, size) = match outcome {
            WriteOutcome::Written { num_rows, size } => (num_rows, size),
            other => panic!("expected written outcome, got {other:?}"),
        };
        assert_eq!(num_rows, 2);

        let meta = factory
            .bucket("archive")
            .unwrap()
            .head(&Path::from("trades_x.csv"))
            .await
            .unwrap();
        assert_eq!(meta.size, size.as_u64());

        let batch = read_csv(&factory, "trades_x.csv").await;
        assert_eq!(batch.num_rows(), 2);
        let created = batch.column(0).as_primitive::<TimestampMicrosecondType>();
        assert_eq!(created.value(0), created_at().timestamp_micros());
        let datetime = batch.column(1).as_primitive::<TimestampMicrosecondType>();
        assert_eq!(datetime.value(1), created_at().timestamp_micros() + 2_000);
    }

    #[tokio::test]
    async fn test_null_cells_are_written() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());
        let mut record = sample_record(1);
        record.amount = FieldValue::Uncast(json!(false));
        record.datetime = FieldValue::Uncast(json!(""));

        let outcome = writer(factory.clone())
            .write(vec![record].into(), "archive", "t.csv", "csv", DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap();

        assert!(matches!(outcome, WriteOutcome::Written { num_rows: 1, .. }));
        let batch = read_csv(&factory, "t.csv").await;
        assert!(batch.column(1).is_null(0));
        assert!(batch.column(7).is_null(0));
        assert_eq!(batch.column(2).as_string::<i32>().value(0), "1");
    }

    #[tokio::test]
    async fn test_store_uses_attempt_budget() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());

        writer(factory.clone())
            .with_retry_timeout(Duration::from_secs(10))
            .write(vec![sample_record(1)].into(), "archive", "t.parquet", "parquet", 5)
            .await
            .unwrap();

        let requested = factory.requested_stores();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].0, "archive");
        assert_eq!(requested[0].1.max_attempts, 5);
        assert_eq!(requested[0].1.max_retries(), 4);
        assert_eq!(requested[0].1.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_empty_input_is_skipped() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());

        let outcome = writer(factory.clone())
            .write(Vec::new().into(), "archive", "t.csv", "csv", DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::Empty));
        assert!(factory.requested_stores().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_format_is_skipped() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());

        let outcome = writer(factory.clone())
            .write(vec![sample_record(1)].into(), "archive", "t.json", "json", 3)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WriteOutcome::Skipped(SkipReason::UnsupportedFormat("json".to_string()))
        );
        assert!(factory.requested_stores().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key_is_returned() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());

        for format in ["csv", "parquet"] {
            let err = writer(factory.clone())
                .write(vec![sample_record(1)].into(), "archive", "a//b", format, 3)
                .await
                .unwrap_err();

            match err {
                ArchiveError::Path { key, .. } => assert_eq!(key, "a//b"),
                other => panic!("expected path error, got {other:?}"),
            }
        }
        assert!(factory.requested_stores().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key_fails_before_empty_check() {
        let factory = Arc::new(InMemoryObjectStoreFactory::new());

        let err = writer(factory)
            .write(Vec::new().into(), "archive", "a//b.csv", "csv", 3)
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Path { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let writer = ArchiveWriter::new(Arc::new(FailingObjectStoreFactory));

        let err = writer
            .write(vec![sample_record(1)].into(), "archive", "t.csv", "csv", 3)
            .await
            .unwrap_err();

        match err {
            ArchiveError::ObjectStoreClient { bucket, .. } => assert_eq!(bucket, "archive"),
            other => panic!("expected object store client error, got {other:?}"),
        }
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(WriteState::Idle.to_string(), "idle");
        assert_eq!(WriteState::Uploading.to_string(), "uploading");
        assert_eq!(WriteState::Failed.to_string(), "failed");
    }
}
