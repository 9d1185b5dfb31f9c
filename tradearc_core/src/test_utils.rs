use std::sync::{Arc, Mutex};

use bytesize::ByteSize;
use chrono::{DateTime, TimeZone, Utc};
use object_store::ObjectStore;
use tradearc_object_store::{ObjectStoreFactory, RetryPolicy};

use crate::encode::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use crate::record::{FieldValue, TradeRecord};
use crate::table::ArchiveInput;
use crate::writer::{ArchiveSink, SkipReason, WriteOutcome};

/// Fixed normalization time used by the unit tests.
pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

/// A fully populated record whose values are derived from `id`.
pub fn sample_record(id: i64) -> TradeRecord {
    TradeRecord {
        created_at: created_at(),
        datetime: FieldValue::Cast(created_at() + chrono::Duration::milliseconds(id)),
        trade_id: FieldValue::Cast(id.to_string()),
        timestamp: FieldValue::Cast(1_714_550_400_000 + id),
        exchange: FieldValue::Cast("binance".to_string()),
        symbol: FieldValue::Cast("BTC/USDT".to_string()),
        price: FieldValue::Cast(64_000.0 + id as f64),
        amount: FieldValue::Cast(0.5),
    }
}

/// A raw record string wrapping a single trade, as found in raw batches.
pub fn raw_record(id: i64) -> String {
    serde_json::json!([{
        "id": id.to_string(),
        "trade_id": id,
        "timestamp": 1_714_550_400_000_i64 + id,
        "datetime": "2024-05-01T08:00:00.000Z",
        "exchange": "binance",
        "symbol": "BTC/USDT",
        "price": 64_000.0 + id as f64,
        "amount": "0.5",
        "side": "buy",
    }])
    .to_string()
}

/// Factory whose stores can never be created.
pub struct FailingObjectStoreFactory;

#[async_trait::async_trait]
impl ObjectStoreFactory for FailingObjectStoreFactory {
    async fn create_object_store(
        &self,
        _bucket: &str,
        _retry: RetryPolicy,
    ) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
        Err(object_store::Error::Generic {
            store: "failing",
            source: "connection refused".into(),
        })
    }
}

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub rows: Vec<TradeRecord>,
    pub bucket: String,
    pub key: String,
    pub format: String,
    pub max_attempts: usize,
}

/// Archive sink that remembers what it was asked to write.
#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl RecordingSink {
    /// A sink that records the call and then fails like a rejected upload.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ArchiveSink for RecordingSink {
    async fn write(
        &self,
        input: ArchiveInput,
        bucket: &str,
        key: &str,
        format: &str,
        max_attempts: usize,
    ) -> Result<WriteOutcome> {
        let rows = match input {
            ArchiveInput::Rows(rows) => rows,
            ArchiveInput::Table(_) => panic!("processor must hand over rows"),
        };
        let num_rows = rows.len();

        self.writes.lock().unwrap().push(RecordedWrite {
            rows,
            bucket: bucket.to_string(),
            key: key.to_string(),
            format: format.to_string(),
            max_attempts,
        });

        if self.fail {
            return Err(ArchiveError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: object_store::Error::Generic {
                    store: "recording",
                    source: "service unavailable".into(),
                },
            });
        }

        if let Err(err) = format.parse::<ArchiveFormat>() {
            return Ok(WriteOutcome::Skipped(SkipReason::UnsupportedFormat(
                err.format,
            )));
        }

        Ok(WriteOutcome::Written {
            num_rows,
            size: ByteSize::b(num_rows as u64 * 100),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_at;

    #[test]
    fn test_raw_record_normalizes_like_sample() {
        let raw: serde_json::Value = serde_json::from_str(&raw_record(3)).unwrap();
        let record = normalize_at(raw[0].clone(), created_at()).unwrap();

        let expected = sample_record(3);
        assert_eq!(record.trade_id, expected.trade_id);
        assert_eq!(record.timestamp, expected.timestamp);
        assert_eq!(record.price, expected.price);
        assert_eq!(record.amount, expected.amount);
        assert_eq!(record.datetime, FieldValue::Cast(created_at()));
    }
}
