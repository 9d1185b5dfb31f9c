#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::csv::ReaderBuilder;
use bytes::Bytes;
use object_store::{ObjectStore, PutPayload, path::Path};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::json;
use tradearc_core::{
    ArchiveConfig, ArchiveWriter, BatchProcessor, Intake, StorageEvent, trade_schema,
};
use tradearc_object_store::ObjectStoreFactory;

pub const RAW_BUCKET: &str = "raw-trades";
pub const ARCHIVE_BUCKET: &str = "trades-archive";

/// Intake wired to a real archive writer over `factory`.
pub fn create_intake(factory: Arc<dyn ObjectStoreFactory>, format: &str) -> Intake {
    let config = ArchiveConfig::default()
        .with_bucket(ARCHIVE_BUCKET)
        .with_key_prefix("trades")
        .with_format(format);
    let writer = ArchiveWriter::new(factory.clone());
    Intake::new(factory, BatchProcessor::new(config, Arc::new(writer)))
}

pub fn trade(id: i64) -> serde_json::Value {
    json!({
        "id": id.to_string(),
        "info": { "m": true },
        "trade_id": id,
        "timestamp": 1_714_550_400_000_i64 + id,
        "datetime": "2024-05-01T08:00:00.000Z",
        "exchange": "kraken",
        "symbol": "ETH/USD",
        "side": "sell",
        "price": format!("{}.25", 3000 + id),
        "amount": 1.5,
    })
}

/// Wraps a trade in the single-element array envelope of raw batches.
pub fn record_string(trade: serde_json::Value) -> String {
    json!([trade]).to_string()
}

pub async fn put_raw_batch(
    factory: &dyn ObjectStoreFactory,
    key: &str,
    records: &[String],
) -> StorageEvent {
    let store = factory
        .create_object_store(RAW_BUCKET, Default::default())
        .await
        .expect("raw bucket");
    let body = serde_json::to_vec(records).expect("encode raw batch");
    store
        .put(&Path::from(key), PutPayload::from(Bytes::from(body)))
        .await
        .expect("put raw batch");

    storage_event(RAW_BUCKET, key)
}

pub fn storage_event(bucket: &str, key: &str) -> StorageEvent {
    let event = json!({
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": bucket },
                "object": { "key": key.replace(' ', "+") }
            }
        }]
    });
    StorageEvent::from_slice(event.to_string().as_bytes()).expect("storage event")
}

pub async fn read_archive(factory: &dyn ObjectStoreFactory, key: &str) -> Bytes {
    let store = factory
        .create_object_store(ARCHIVE_BUCKET, Default::default())
        .await
        .expect("archive bucket");
    store
        .get(&Path::parse(key).expect("archive key"))
        .await
        .expect("get archive")
        .bytes()
        .await
        .expect("archive body")
}

pub fn decode_csv(data: Bytes) -> RecordBatch {
    let mut reader = ReaderBuilder::new(trade_schema())
        .with_header(true)
        .build(Cursor::new(data.to_vec()))
        .expect("csv reader");
    reader.next().expect("one batch").expect("csv batch")
}

pub fn decode_parquet(data: Bytes) -> RecordBatch {
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .expect("parquet reader")
        .build()
        .expect("parquet reader");
    reader.next().expect("one batch").expect("parquet batch")
}
