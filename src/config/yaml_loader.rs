//! YAML Configuration Loader
//!
//! ## Usage
//!
//! ```yaml
//! window:
//!   length_seconds: 3
//!   clock: processing_time
//! fields:
//!   key: Car
//!   gear: telemetry.Gear
//!   event_time_unit: seconds
//! source:
//!   type: kafka
//!   brokers: "localhost:9092"
//!   topic: flink-demo
//!   group_id: flink_consumer
//! sinks:
//!   - type: console
//!   - type: kafka
//!     topic: gear-changes
//! ```
//!
//! Missing sections fall back to their defaults. The loaded configuration is
//! validated before it is returned.

use super::{ConfigError, GearshiftConfig};
use log::debug;
use std::fs;
use std::path::Path;

/// Load, parse and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(file_path: P) -> Result<GearshiftConfig, ConfigError> {
    let path = file_path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = parse_config(&content, path)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse and validate configuration text. `origin` is only used in error messages.
pub fn parse_config(content: &str, origin: &Path) -> Result<GearshiftConfig, ConfigError> {
    // An empty document deserializes as unit, not as an all-defaults mapping.
    let config: GearshiftConfig = if content.trim().is_empty() {
        GearshiftConfig::default()
    } else {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source: e,
        })?
    };

    config.validate()?;
    Ok(config)
}
