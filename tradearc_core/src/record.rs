use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Canonical column names, in archive column order.
pub const TRADE_COLUMNS: [&str; 8] = [
    "created_at",
    "datetime",
    "trade_id",
    "timestamp",
    "exchange",
    "symbol",
    "price",
    "amount",
];

/// A normalized trade.
///
/// Always has exactly the eight canonical fields, whatever the shape of the
/// raw trade it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub created_at: DateTime<Utc>,
    pub datetime: FieldValue<DateTime<Utc>>,
    pub trade_id: FieldValue<String>,
    pub timestamp: FieldValue<i64>,
    pub exchange: FieldValue<String>,
    pub symbol: FieldValue<String>,
    pub price: FieldValue<f64>,
    pub amount: FieldValue<f64>,
}

/// The value of a canonical field after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue<T> {
    /// The field was missing or `null`.
    Null,
    /// The field was truthy and has been cast to the column type.
    Cast(T),
    /// The field was present but falsy (`0`, `""`, `false`, ...) and was
    /// kept as-is, without casting.
    Uncast(Value),
}

impl<T> FieldValue<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_cast(&self) -> Option<&T> {
        match self {
            Self::Cast(value) => Some(value),
            _ => None,
        }
    }
}

impl TradeRecord {
    /// A record with every field null except `created_at`.
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            datetime: FieldValue::Null,
            trade_id: FieldValue::Null,
            timestamp: FieldValue::Null,
            exchange: FieldValue::Null,
            symbol: FieldValue::Null,
            price: FieldValue::Null,
            amount: FieldValue::Null,
        }
    }

    /// The record as a JSON object keyed by the canonical column names.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
