//! Gearshift Configuration
//!
//! Job configuration is a YAML document (see [`yaml_loader`]) deserialized into
//! [`GearshiftConfig`]. Every section has defaults matching the classic deployment:
//! Kafka on `localhost:9092`, topic `flink-demo`, 3-second processing-time windows,
//! key `Car` and gear `telemetry.Gear`.
//!
//! Individual settings can also be overridden with dotted properties, e.g.
//! `window.length.seconds=5` or `gear.field=telemetry.Gear`.

pub mod yaml_loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use yaml_loader::{load_config, parse_config};

pub const DEFAULT_WINDOW_LENGTH_SECONDS: i64 = 3;
pub const DEFAULT_KEY_FIELD: &str = "Car";
pub const DEFAULT_GEAR_FIELD: &str = "telemetry.Gear";
pub const DEFAULT_BROKERS: &str = "localhost:9092";
pub const DEFAULT_SOURCE_TOPIC: &str = "flink-demo";
pub const DEFAULT_GROUP_ID: &str = "flink_consumer";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid window length {value}: must be a positive number of seconds")]
    InvalidWindowLength { value: i64 },

    #[error("Invalid field path '{path}' for {name}: {reason}")]
    InvalidFieldPath {
        name: &'static str,
        path: String,
        reason: &'static str,
    },

    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSetting {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Which clock drives window closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowClock {
    /// Events are stamped at ingestion; windows close on wall-clock ticks
    #[default]
    ProcessingTime,
    /// Events carry their own time; windows close as the watermark passes them
    EventTime,
}

impl FromStr for WindowClock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "processing_time" | "processing" => Ok(WindowClock::ProcessingTime),
            "event_time" | "event" => Ok(WindowClock::EventTime),
            other => Err(format!(
                "unknown clock '{}', expected processing_time or event_time",
                other
            )),
        }
    }
}

impl fmt::Display for WindowClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowClock::ProcessingTime => write!(f, "processing_time"),
            WindowClock::EventTime => write!(f, "event_time"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Tumbling window length in seconds
    pub length_seconds: i64,
    pub clock: WindowClock,
    /// Event-time watermark lag behind the highest observed event time
    pub max_out_of_orderness_ms: i64,
    /// Processing-time watermark tick period
    pub tick_interval_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            length_seconds: DEFAULT_WINDOW_LENGTH_SECONDS,
            clock: WindowClock::ProcessingTime,
            max_out_of_orderness_ms: 0,
            tick_interval_ms: 200,
        }
    }
}

/// Unit of numeric event-time values, applied to integers, floats and numeric strings alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTimeUnit {
    /// Epoch seconds, possibly fractional (`"52.196000"`)
    #[default]
    Seconds,
    /// Epoch milliseconds
    Millis,
}

impl EventTimeUnit {
    /// Milliseconds per unit
    pub fn millis_per_unit(&self) -> i64 {
        match self {
            EventTimeUnit::Seconds => 1000,
            EventTimeUnit::Millis => 1,
        }
    }
}

impl FromStr for EventTimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "seconds" | "secs" | "s" => Ok(EventTimeUnit::Seconds),
            "millis" | "milliseconds" | "ms" => Ok(EventTimeUnit::Millis),
            other => Err(format!(
                "unknown event time unit '{}', expected seconds or millis",
                other
            )),
        }
    }
}

impl fmt::Display for EventTimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTimeUnit::Seconds => write!(f, "seconds"),
            EventTimeUnit::Millis => write!(f, "millis"),
        }
    }
}

/// Dotted field paths into the incoming record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub key: String,
    pub gear: String,
    pub event_time: Option<String>,
    pub event_time_unit: EventTimeUnit,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY_FIELD.to_string(),
            gear: DEFAULT_GEAR_FIELD.to_string(),
            event_time: None,
            event_time_unit: EventTimeUnit::Seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Kafka {
        #[serde(default = "default_brokers")]
        brokers: String,
        #[serde(default = "default_source_topic")]
        topic: String,
        #[serde(default = "default_group_id")]
        group_id: String,
    },
    /// Newline-delimited JSON file, one record per line
    File { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Kafka {
            brokers: default_brokers(),
            topic: default_source_topic(),
            group_id: default_group_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    Console,
    Kafka {
        #[serde(default = "default_brokers")]
        brokers: String,
        topic: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of single-writer shard workers keys are partitioned across
    pub shards: usize,
    /// Bounded channel capacity between pipeline stages
    pub channel_capacity: usize,
    /// Maximum records pulled from the source per read
    pub batch_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shards: 4,
            channel_capacity: 1024,
            batch_size: 100,
        }
    }
}

/// Complete job configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearshiftConfig {
    pub window: WindowConfig,
    pub fields: FieldsConfig,
    pub source: SourceConfig,
    pub sinks: Vec<SinkConfig>,
    pub runtime: RuntimeConfig,
}

impl Default for GearshiftConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            fields: FieldsConfig::default(),
            source: SourceConfig::default(),
            sinks: vec![SinkConfig::Console],
            runtime: RuntimeConfig::default(),
        }
    }
}

impl GearshiftConfig {
    /// Window length in milliseconds. Only meaningful after [`validate`](Self::validate).
    pub fn window_size_ms(&self) -> i64 {
        self.window.length_seconds.saturating_mul(1000)
    }

    /// Apply dotted property overrides.
    ///
    /// Recognised keys: `window.length.seconds`, `window.clock`,
    /// `window.max.out.of.orderness.ms`, `key.field`, `gear.field`, `event.time.field`,
    /// `event.time.unit`, `runtime.shards`.
    pub fn apply_properties(
        &mut self,
        properties: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (name, value) in properties {
            match name.as_str() {
                "window.length.seconds" => {
                    self.window.length_seconds = parse_number(name, value)?;
                }
                "window.clock" => {
                    self.window.clock = value
                        .parse()
                        .map_err(|reason: String| ConfigError::invalid(name, reason))?;
                }
                "window.max.out.of.orderness.ms" => {
                    self.window.max_out_of_orderness_ms = parse_number(name, value)?;
                }
                "key.field" => self.fields.key = value.clone(),
                "gear.field" => self.fields.gear = value.clone(),
                "event.time.field" => {
                    self.fields.event_time = (!value.is_empty()).then(|| value.clone());
                }
                "event.time.unit" => {
                    self.fields.event_time_unit = value
                        .parse()
                        .map_err(|reason: String| ConfigError::invalid(name, reason))?;
                }
                "runtime.shards" => self.runtime.shards = parse_number(name, value)?,
                _ => return Err(ConfigError::invalid(name, "unknown property")),
            }
        }
        Ok(())
    }

    /// Validate the configuration before a job is allowed to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let length = self.window.length_seconds;
        if length <= 0 || length.checked_mul(1000).is_none() {
            return Err(ConfigError::InvalidWindowLength { value: length });
        }
        if self.window.max_out_of_orderness_ms < 0 {
            return Err(ConfigError::invalid(
                "window.max_out_of_orderness_ms",
                "must not be negative",
            ));
        }
        if self.window.tick_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "window.tick_interval_ms",
                "must be positive",
            ));
        }

        validate_field_path("fields.key", &self.fields.key)?;
        validate_field_path("fields.gear", &self.fields.gear)?;
        if let Some(path) = &self.fields.event_time {
            validate_field_path("fields.event_time", path)?;
        }

        match &self.source {
            SourceConfig::Kafka {
                brokers,
                topic,
                group_id,
            } => {
                require_non_empty("source.brokers", brokers)?;
                require_non_empty("source.topic", topic)?;
                require_non_empty("source.group_id", group_id)?;
            }
            SourceConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::invalid("source.path", "must not be empty"));
                }
            }
        }

        if self.sinks.is_empty() {
            return Err(ConfigError::invalid("sinks", "at least one sink is required"));
        }
        for sink in &self.sinks {
            if let SinkConfig::Kafka { brokers, topic } = sink {
                require_non_empty("sinks.brokers", brokers)?;
                require_non_empty("sinks.topic", topic)?;
            }
        }

        if self.runtime.shards == 0 {
            return Err(ConfigError::invalid("runtime.shards", "must be positive"));
        }
        if self.runtime.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "runtime.channel_capacity",
                "must be positive",
            ));
        }
        if self.runtime.batch_size == 0 {
            return Err(ConfigError::invalid("runtime.batch_size", "must be positive"));
        }

        Ok(())
    }
}

fn default_brokers() -> String {
    DEFAULT_BROKERS.to_string()
}

fn default_source_topic() -> String {
    DEFAULT_SOURCE_TOPIC.to_string()
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.to_string()
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, format!("'{}' is not a valid number", value)))
}

fn require_non_empty(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(name, "must not be empty"));
    }
    Ok(())
}

fn validate_field_path(name: &'static str, path: &str) -> Result<(), ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::InvalidFieldPath {
            name,
            path: path.to_string(),
            reason: "path is empty",
        });
    }
    if path.split('.').any(|segment| segment.is_empty()) {
        return Err(ConfigError::InvalidFieldPath {
            name,
            path: path.to_string(),
            reason: "path contains an empty segment",
        });
    }
    Ok(())
}
