//! Normalization of raw trades into [`TradeRecord`]s.
//!
//! A field is cast only when it is present *and* truthy. Falsy values (`0`,
//! `0.0`, `""`, `false`, `[]`, `{}`) are kept untouched as
//! [`FieldValue::Uncast`], which means a zero price is archived as the raw
//! `0` and an empty trade id as `""`. This mirrors the behaviour of the
//! producer pipeline the archive is shared with and must not be changed
//! without agreeing on it with the archive consumers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use snafu::OptionExt;

use crate::error::{CastSnafu, NotAnObjectSnafu, RecordError};
use crate::record::{FieldValue, TradeRecord};

pub type Result<T, E = RecordError> = std::result::Result<T, E>;

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Normalizes a raw trade, stamping `created_at` with the current time.
pub fn normalize(raw: Value) -> Result<TradeRecord> {
    normalize_at(raw, Utc::now())
}

/// Normalizes a raw trade, stamping `created_at` with `now`.
///
/// Fields outside the canonical set are dropped and missing canonical fields
/// become null. Fails if `raw` is not a JSON object or if a truthy field
/// cannot be cast to its column type.
pub fn normalize_at(raw: Value, now: DateTime<Utc>) -> Result<TradeRecord> {
    let mut fields = match raw {
        Value::Object(fields) => fields,
        other => {
            return NotAnObjectSnafu {
                found: json_type_name(&other),
            }
            .fail();
        }
    };

    Ok(TradeRecord {
        created_at: now,
        datetime: cast_field(&mut fields, "datetime", "datetime", parse_datetime)?,
        trade_id: cast_field(&mut fields, "trade_id", "string", cast_string)?,
        timestamp: cast_field(&mut fields, "timestamp", "integer", cast_integer)?,
        exchange: cast_field(&mut fields, "exchange", "string", cast_string)?,
        symbol: cast_field(&mut fields, "symbol", "string", cast_string)?,
        price: cast_field(&mut fields, "price", "float", cast_float)?,
        amount: cast_field(&mut fields, "amount", "float", cast_float)?,
    })
}

fn cast_field<T>(
    fields: &mut Map<String, Value>,
    field: &'static str,
    target: &'static str,
    cast: fn(&Value) -> Option<T>,
) -> Result<FieldValue<T>> {
    let Some(value) = fields.remove(field) else {
        return Ok(FieldValue::Null);
    };

    if !is_truthy(&value) {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        return Ok(FieldValue::Uncast(value));
    }

    let cast_value = cast(&value).context(CastSnafu {
        field,
        target,
        value: value.to_string(),
    })?;

    Ok(FieldValue::Cast(cast_value))
}

/// Truthiness of a JSON value: `null`, `false`, zero, and empty strings,
/// arrays and objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn cast_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn cast_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn cast_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            if n.is_u64() {
                // Larger than i64::MAX.
                return None;
            }
            let f = n.as_f64()?.trunc();
            (f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
        }
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
