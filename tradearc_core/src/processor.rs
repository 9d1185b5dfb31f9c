use std::sync::Arc;
use std::time::Instant;

use bytesize::ByteSize;
use chrono::Utc;
use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, error, info};
use tradearc_object_store::paths::format_archive_key;
use tradearc_observability::KeyValue;

use crate::config::ArchiveConfig;
use crate::error::{ArchiveSnafu, EnvelopeSnafu, JsonSnafu, ProcessError, RecordError};
use crate::metrics::PipelineMetrics;
use crate::normalize::{json_type_name, normalize};
use crate::record::TradeRecord;
use crate::table::ArchiveInput;
use crate::writer::{ArchiveSink, SkipReason, WriteOutcome};

/// Result of processing one raw batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No record survived normalization; the archive was not touched.
    Empty { rejected: usize },
    Archived {
        key: String,
        accepted: usize,
        rejected: usize,
        size: ByteSize,
    },
    /// The writer declined the batch without failing.
    Skipped {
        key: String,
        accepted: usize,
        rejected: usize,
        reason: SkipReason,
    },
}

/// Normalizes raw batches and hands the accepted records to the archive.
pub struct BatchProcessor {
    config: ArchiveConfig,
    sink: Arc<dyn ArchiveSink>,
    metrics: PipelineMetrics,
}

impl BatchProcessor {
    pub fn new(config: ArchiveConfig, sink: Arc<dyn ArchiveSink>) -> Self {
        Self {
            config,
            sink,
            metrics: PipelineMetrics::default(),
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Normalizes every record of `raw_records` and archives the survivors.
    ///
    /// Malformed records are logged and skipped. A failed archive write is
    /// logged and returned so the trigger can retry the whole batch.
    pub async fn process(&self, raw_records: &[String]) -> Result<ProcessOutcome, ProcessError> {
        let start = Instant::now();
        let mut batch = Vec::with_capacity(raw_records.len());
        let mut rejected = 0;

        for (index, raw) in raw_records.iter().enumerate() {
            match parse_record(raw) {
                Ok(record) => batch.push(record),
                Err(err) => {
                    rejected += 1;
                    error!(index, err = ?err, "skipping malformed record");
                }
            }
        }

        let accepted = batch.len();
        let elapsed = start.elapsed();
        self.metrics
            .normalize_duration
            .record(elapsed.as_secs_f64(), &[]);
        self.metrics.accepted_records.add(accepted as u64, &[]);
        self.metrics.rejected_records.add(rejected as u64, &[]);
        debug!(accepted, rejected, elapsed = ?elapsed, "normalized batch");

        if batch.is_empty() {
            info!(rejected, "no valid records in batch, nothing to archive");
            return Ok(ProcessOutcome::Empty { rejected });
        }

        let bucket = self.config.bucket.as_str();
        let format = self.config.format.as_str();
        let key = format_archive_key(&self.config.key_prefix, Utc::now(), format);

        let start = Instant::now();
        let result = self
            .sink
            .write(
                ArchiveInput::Rows(batch),
                bucket,
                &key,
                format,
                self.config.max_attempts,
            )
            .await;
        let elapsed = start.elapsed();
        self.metrics.archive_duration.record(
            elapsed.as_secs_f64(),
            &[KeyValue::new("success", result.is_ok())],
        );

        match result {
            Ok(WriteOutcome::Written { size, .. }) => {
                self.metrics.archived_bytes.add(size.as_u64(), &[]);
                info!(bucket, key, accepted, rejected, elapsed = ?elapsed, "batch archived");
                Ok(ProcessOutcome::Archived {
                    key,
                    accepted,
                    rejected,
                    size,
                })
            }
            Ok(WriteOutcome::Skipped(reason)) => Ok(ProcessOutcome::Skipped {
                key,
                accepted,
                rejected,
                reason,
            }),
            Err(err) => {
                error!(
                    severity = "critical",
                    bucket,
                    key,
                    err = ?err,
                    "archiving batch failed"
                );
                Err(err).context(ArchiveSnafu { bucket, key })
            }
        }
    }
}

/// Decodes a record string (a JSON array holding one trade) and normalizes
/// the trade.
pub fn parse_record(raw: &str) -> Result<TradeRecord, RecordError> {
    let envelope: Value = serde_json::from_str(raw).context(JsonSnafu {})?;

    let items = match envelope {
        Value::Array(items) => items,
        other => {
            return EnvelopeSnafu {
                found: json_type_name(&other),
            }
            .fail();
        }
    };

    match <[Value; 1]>::try_from(items) {
        Ok([trade]) => normalize(trade),
        Err(items) => EnvelopeSnafu {
            found: format!("an array of {} elements", items.len()),
        }
        .fail(),
    }
}
