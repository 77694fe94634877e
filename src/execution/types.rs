//! Core record types.
//!
//! This module contains the structured-record access layer the parser reads from:
//! - [`FieldValue`] - A dynamically typed field value decoded from the wire format
//! - [`StreamRecord`] - One incoming record plus its transport metadata

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A value in a record field.
///
/// Nested JSON objects become [`FieldValue::Struct`] so that dotted field paths such as
/// `telemetry.Gear` can be resolved with [`StreamRecord::get_path`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value (true/false)
    Boolean(bool),
    /// Missing / JSON null
    Null,
    /// Array of values
    Array(Vec<FieldValue>),
    /// Structured data with named fields
    Struct(HashMap<String, FieldValue>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FieldValue::Struct(fields) => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                write!(f, "{{")?;
                for (i, name) in names.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, fields[name])?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl FieldValue {
    /// Get the type name for error messages and diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::String(_) => "STRING",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Null => "NULL",
            FieldValue::Array(_) => "ARRAY",
            FieldValue::Struct(_) => "STRUCT",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Convert a decoded JSON value into a field value.
    ///
    /// Whole JSON numbers that fit in `i64` become `Integer`, every other number becomes `Float`.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(map) => FieldValue::Struct(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into JSON, used by the relay job to forward records verbatim.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            FieldValue::Struct(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// A single record flowing from a source into the job.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// The decoded payload fields
    pub fields: HashMap<String, FieldValue>,
    /// Processing-time timestamp in milliseconds since epoch
    pub timestamp: i64,
    /// Offset of this record within its partition (line number for files)
    pub offset: i64,
    /// Partition number this record came from
    pub partition: i32,
}

impl StreamRecord {
    /// Create a new StreamRecord with the given fields and zeroed metadata.
    pub fn new(fields: HashMap<String, FieldValue>) -> Self {
        Self {
            fields,
            timestamp: 0,
            offset: 0,
            partition: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_position(mut self, partition: i32, offset: i64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }

    /// Decode a JSON document into a record.
    ///
    /// The payload must be a JSON object; anything else is rejected with a message
    /// suitable for a decode diagnostic.
    pub fn from_json_slice(payload: &[u8]) -> Result<Self, String> {
        let value: Value = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
        match FieldValue::from_json(value) {
            FieldValue::Struct(fields) => Ok(StreamRecord::new(fields)),
            other => Err(format!(
                "expected a JSON object, got {}",
                other.type_name()
            )),
        }
    }

    /// Encode the payload fields as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Resolve a dotted field path (e.g. `telemetry.Gear`) against the payload.
    ///
    /// Returns `None` if any path segment is missing or an intermediate value is not a struct.
    pub fn get_path(&self, path: &str) -> Option<&FieldValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            match current {
                FieldValue::Struct(inner) => current = inner.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"Car": 9, "time": "52.196000", "telemetry": {"Vaz": "1.270000", "Gear": "3.000000", "RPM": "591.266113"}}"#;

    #[test]
    fn test_from_json_slice_builds_nested_structs() {
        let record = StreamRecord::from_json_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(record.fields.get("Car"), Some(&FieldValue::Integer(9)));
        assert_eq!(
            record.get_path("telemetry.Gear"),
            Some(&FieldValue::String("3.000000".to_string()))
        );
    }

    #[test]
    fn test_get_path_missing_segments() {
        let record = StreamRecord::from_json_slice(SAMPLE.as_bytes()).unwrap();
        assert!(record.get_path("telemetry.Clutch").is_none());
        assert!(record.get_path("Car.Gear").is_none());
        assert!(record.get_path("").is_none());
    }

    #[test]
    fn test_from_json_slice_rejects_non_objects() {
        let err = StreamRecord::from_json_slice(b"[1, 2, 3]").unwrap_err();
        assert!(err.contains("ARRAY"));
        assert!(StreamRecord::from_json_slice(b"{not json").is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_payload() {
        let record = StreamRecord::from_json_slice(SAMPLE.as_bytes()).unwrap();
        let expected: Value = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(record.to_json(), expected);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldValue::Integer(1).type_name(), "INTEGER");
        assert_eq!(FieldValue::Float(1.5).type_name(), "FLOAT");
        assert_eq!(FieldValue::Null.type_name(), "NULL");
        assert_eq!(FieldValue::Struct(HashMap::new()).type_name(), "STRUCT");
    }
}
