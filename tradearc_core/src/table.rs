use std::sync::{Arc, LazyLock};

use arrow::array::{
    ArrayRef, Float64Builder, Int64Builder, RecordBatch, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde_json::Value;
use snafu::ResultExt;
use tracing::debug;

use crate::error::{ArrowSnafu, Result};
use crate::normalize::json_type_name;
use crate::record::{FieldValue, TradeRecord};

/// Named zones such as "UTC" need arrow's chrono-tz feature to write csv.
const UTC_OFFSET: &str = "+00:00";

static TRADE_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    let timestamp = DataType::Timestamp(TimeUnit::Microsecond, Some(UTC_OFFSET.into()));
    Arc::new(Schema::new(vec![
        Field::new("created_at", timestamp.clone(), false),
        Field::new("datetime", timestamp, true),
        Field::new("trade_id", DataType::Utf8, true),
        Field::new("timestamp", DataType::Int64, true),
        Field::new("exchange", DataType::Utf8, true),
        Field::new("symbol", DataType::Utf8, true),
        Field::new("price", DataType::Float64, true),
        Field::new("amount", DataType::Float64, true),
    ]))
});

/// Arrow schema of archived trades, in canonical column order.
pub fn trade_schema() -> SchemaRef {
    TRADE_SCHEMA.clone()
}

/// Data handed to the archive writer.
#[derive(Debug, Clone)]
pub enum ArchiveInput {
    /// Already tabular data, archived as-is.
    Table(RecordBatch),
    /// Normalized records, coerced into a [`trade_schema`] record batch.
    Rows(Vec<TradeRecord>),
}

impl ArchiveInput {
    pub fn into_record_batch(self) -> Result<RecordBatch> {
        match self {
            Self::Table(batch) => Ok(batch),
            Self::Rows(rows) => records_to_batch(&rows),
        }
    }
}

impl From<RecordBatch> for ArchiveInput {
    fn from(batch: RecordBatch) -> Self {
        Self::Table(batch)
    }
}

impl From<Vec<TradeRecord>> for ArchiveInput {
    fn from(rows: Vec<TradeRecord>) -> Self {
        Self::Rows(rows)
    }
}

/// Builds a record batch with the canonical schema.
///
/// Uncast values are admitted when their JSON type fits the column (numbers
/// in numeric columns, strings in string columns). Any other falsy value is
/// treated as absent and written as null.
pub fn records_to_batch(rows: &[TradeRecord]) -> Result<RecordBatch> {
    let capacity = rows.len();
    let mut created_at =
        TimestampMicrosecondBuilder::with_capacity(capacity).with_timezone(UTC_OFFSET);
    let mut datetime =
        TimestampMicrosecondBuilder::with_capacity(capacity).with_timezone(UTC_OFFSET);
    let mut trade_id = StringBuilder::with_capacity(capacity, capacity * 16);
    let mut timestamp = Int64Builder::with_capacity(capacity);
    let mut exchange = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut symbol = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut price = Float64Builder::with_capacity(capacity);
    let mut amount = Float64Builder::with_capacity(capacity);

    for (row, record) in rows.iter().enumerate() {
        created_at.append_value(record.created_at.timestamp_micros());
        datetime.append_option(
            coerce(&record.datetime, "datetime", row, |_| None).map(|dt| dt.timestamp_micros()),
        );
        trade_id.append_option(coerce(&record.trade_id, "trade_id", row, json_string));
        timestamp.append_option(coerce(&record.timestamp, "timestamp", row, json_integer));
        exchange.append_option(coerce(&record.exchange, "exchange", row, json_string));
        symbol.append_option(coerce(&record.symbol, "symbol", row, json_string));
        price.append_option(coerce(&record.price, "price", row, Value::as_f64));
        amount.append_option(coerce(&record.amount, "amount", row, Value::as_f64));
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(created_at.finish()),
        Arc::new(datetime.finish()),
        Arc::new(trade_id.finish()),
        Arc::new(timestamp.finish()),
        Arc::new(exchange.finish()),
        Arc::new(symbol.finish()),
        Arc::new(price.finish()),
        Arc::new(amount.finish()),
    ];

    RecordBatch::try_new(trade_schema(), columns).context(ArrowSnafu {})
}

fn coerce<T: Clone>(
    value: &FieldValue<T>,
    column: &'static str,
    row: usize,
    from_json: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    match value {
        FieldValue::Null => None,
        FieldValue::Cast(value) => Some(value.clone()),
        FieldValue::Uncast(raw) => {
            let coerced = from_json(raw);
            if coerced.is_none() {
                debug!(
                    column,
                    row,
                    found = json_type_name(raw),
                    "uncast value does not fit column, writing null"
                );
            }
            coerced
        }
    }
}

fn json_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn json_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}
