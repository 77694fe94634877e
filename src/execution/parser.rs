//! Telemetry Event Extraction
//!
//! Turns one structured [`StreamRecord`] into a [`TelemetryEvent`] by resolving the
//! configured key, gear and (optional) event-time field paths.
//!
//! ## Coercion rules
//!
//! | Field | Accepted values |
//! |-------|-----------------|
//! | key   | string (verbatim), integer or float (rendered as text) |
//! | gear  | integer, float, numeric string; fractional readings are truncated toward zero |
//! | event time | integer, float or numeric string in the configured [`EventTimeUnit`] |
//!
//! Numeric readings that do not fit in an `i64` are rejected rather than clamped.
//!
//! Parse failures are per-record: the caller drops the record and keeps going.

use crate::config::{EventTimeUnit, FieldsConfig};
use crate::execution::types::{FieldValue, StreamRecord};
use thiserror::Error;

/// One parsed reading, ready for windowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    /// Vehicle identifier
    pub key: String,
    /// Gear reading, compared by equality only
    pub gear: i64,
    /// Event time in milliseconds
    pub event_time: i64,
}

impl TelemetryEvent {
    pub fn new(key: impl Into<String>, gear: i64, event_time: i64) -> Self {
        Self {
            key: key.into(),
            gear,
            event_time,
        }
    }
}

/// Per-record extraction errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Field path not present in the record (or explicitly null)
    #[error("Field '{field}' not found in record")]
    MissingField { field: String },

    /// Field present but cannot be coerced to the expected type
    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: String,
    },
}

/// Extracts `(key, gear, event_time)` from records using configured field paths.
#[derive(Debug, Clone)]
pub struct TelemetryParser {
    key_field: String,
    gear_field: String,
    event_time_field: Option<String>,
    event_time_unit: EventTimeUnit,
}

impl TelemetryParser {
    pub fn new(
        key_field: impl Into<String>,
        gear_field: impl Into<String>,
        event_time_field: Option<String>,
    ) -> Self {
        Self {
            key_field: key_field.into(),
            gear_field: gear_field.into(),
            event_time_field,
            event_time_unit: EventTimeUnit::default(),
        }
    }

    pub fn with_event_time_unit(mut self, unit: EventTimeUnit) -> Self {
        self.event_time_unit = unit;
        self
    }

    pub fn from_config(fields: &FieldsConfig) -> Self {
        Self::new(
            fields.key.clone(),
            fields.gear.clone(),
            fields.event_time.clone(),
        )
        .with_event_time_unit(fields.event_time_unit)
    }

    /// Parse one record.
    ///
    /// When no event-time field is configured the record's processing-time
    /// `timestamp` is used as event time.
    pub fn parse(&self, record: &StreamRecord) -> Result<TelemetryEvent, ParseError> {
        let key = coerce_key(required(record, &self.key_field)?, &self.key_field)?;
        let gear = coerce_gear(required(record, &self.gear_field)?, &self.gear_field)?;
        let event_time = match &self.event_time_field {
            Some(path) => coerce_event_time(required(record, path)?, path, self.event_time_unit)?,
            None => record.timestamp,
        };

        Ok(TelemetryEvent {
            key,
            gear,
            event_time,
        })
    }
}

fn required<'a>(record: &'a StreamRecord, path: &str) -> Result<&'a FieldValue, ParseError> {
    match record.get_path(path) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(ParseError::MissingField {
            field: path.to_string(),
        }),
    }
}

fn type_mismatch(field: &str, expected: &'static str, value: &FieldValue) -> ParseError {
    ParseError::TypeMismatch {
        field: field.to_string(),
        expected,
        actual: value.type_name().to_string(),
    }
}

fn coerce_key(value: &FieldValue, field: &str) -> Result<String, ParseError> {
    match value {
        FieldValue::String(s) => Ok(s.clone()),
        FieldValue::Integer(i) => Ok(i.to_string()),
        FieldValue::Float(f) => Ok(f.to_string()),
        other => Err(type_mismatch(field, "STRING or number", other)),
    }
}

/// Numeric view of a field, accepting numeric strings such as `"3.000000"`.
fn as_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Integer(i) => Some(*i as f64),
        FieldValue::Float(f) => Some(*f),
        FieldValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// `n` as an `i64`, or `None` when it is not finite or falls outside the `i64` range.
fn to_i64(n: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if n.is_finite() && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

fn coerce_gear(value: &FieldValue, field: &str) -> Result<i64, ParseError> {
    if let FieldValue::Integer(i) = value {
        return Ok(*i);
    }

    match as_number(value) {
        Some(n) => to_i64(n.trunc()).ok_or_else(|| ParseError::TypeMismatch {
            field: field.to_string(),
            expected: "finite number within i64 range",
            actual: value.to_string(),
        }),
        None => Err(type_mismatch(field, "numeric value", value)),
    }
}

fn coerce_event_time(
    value: &FieldValue,
    field: &str,
    unit: EventTimeUnit,
) -> Result<i64, ParseError> {
    let per_unit = unit.millis_per_unit();
    let millis = match value {
        FieldValue::Integer(i) => i.checked_mul(per_unit),
        other => as_number(other).and_then(|n| to_i64((n * per_unit as f64).round())),
    };

    millis.ok_or_else(|| match as_number(value) {
        Some(_) => ParseError::TypeMismatch {
            field: field.to_string(),
            expected: "epoch time within i64 range",
            actual: value.to_string(),
        },
        None => type_mismatch(field, "numeric epoch time", value),
    })
}
