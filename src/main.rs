//! gearshift command line
//!
//! ## Usage
//!
//! ```bash
//! # Count gear changes from Kafka with the defaults (localhost:9092, topic flink-demo)
//! gearshift run
//!
//! # Replay a JSON-lines capture with event-time windows
//! gearshift run --input telemetry.jsonl --clock event_time --event-time-field time
//!
//! # Same, for a capture whose timestamps are epoch milliseconds
//! gearshift run --input capture.jsonl --clock event_time --event-time-field ts --event-time-unit millis
//!
//! # Load a YAML config and override single settings
//! gearshift run --config gearshift.yaml -p window.length.seconds=5
//!
//! # Print and forward every raw record to another topic
//! gearshift relay --topic flink-demo --output-topic teams
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use gearshift::config::{
    load_config, EventTimeUnit, GearshiftConfig, SinkConfig, SourceConfig, WindowClock,
};
use gearshift::config::{DEFAULT_BROKERS, DEFAULT_GROUP_ID, DEFAULT_SOURCE_TOPIC};
use gearshift::server::{run_from_config, RelayJob, ShutdownCoordinator};
use gearshift::ConfigError;
use log::{error, info};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gearshift")]
#[command(about = "Per-vehicle gear transition counts over tumbling windows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count gear transitions per vehicle per window
    Run {
        #[command(flatten)]
        args: JobArgs,
    },
    /// Forward every raw record to the configured sinks
    Relay {
        #[command(flatten)]
        args: JobArgs,
    },
}

#[derive(Args, Debug, Default)]
struct JobArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read newline-delimited JSON from this file instead of Kafka
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Kafka bootstrap servers
    #[arg(long)]
    brokers: Option<String>,

    /// Kafka topic to consume
    #[arg(long)]
    topic: Option<String>,

    /// Kafka consumer group
    #[arg(long)]
    group_id: Option<String>,

    /// Tumbling window length in seconds
    #[arg(short, long)]
    window_seconds: Option<i64>,

    /// Dotted path of the vehicle key field
    #[arg(long)]
    key_field: Option<String>,

    /// Dotted path of the gear field
    #[arg(long)]
    gear_field: Option<String>,

    /// Dotted path of the event time field (event_time clock)
    #[arg(long)]
    event_time_field: Option<String>,

    /// Unit of numeric event times: seconds or millis
    #[arg(long)]
    event_time_unit: Option<EventTimeUnit>,

    /// Window clock: processing_time or event_time
    #[arg(long)]
    clock: Option<WindowClock>,

    /// Also publish output lines to this Kafka topic
    #[arg(long)]
    output_topic: Option<String>,

    /// Do not print output lines to stdout
    #[arg(long)]
    no_console: bool,

    /// Number of shard workers
    #[arg(long)]
    shards: Option<usize>,

    /// Property override, e.g. -p window.length.seconds=5
    #[arg(short = 'p', long = "property", value_parser = parse_property)]
    properties: Vec<(String, String)>,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid property '{}', expected key=value", s))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

impl JobArgs {
    /// Merge the config file, property overrides and flags, in that order.
    fn into_config(self) -> Result<GearshiftConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => GearshiftConfig::default(),
        };

        let properties: HashMap<String, String> = self.properties.into_iter().collect();
        config.apply_properties(&properties)?;

        if let Some(seconds) = self.window_seconds {
            config.window.length_seconds = seconds;
        }
        if let Some(clock) = self.clock {
            config.window.clock = clock;
        }
        if let Some(key) = self.key_field {
            config.fields.key = key;
        }
        if let Some(gear) = self.gear_field {
            config.fields.gear = gear;
        }
        if let Some(event_time) = self.event_time_field {
            config.fields.event_time = Some(event_time);
        }
        if let Some(unit) = self.event_time_unit {
            config.fields.event_time_unit = unit;
        }
        if let Some(shards) = self.shards {
            config.runtime.shards = shards;
        }

        if let Some(path) = self.input {
            config.source = SourceConfig::File { path };
        } else if self.brokers.is_some() || self.topic.is_some() || self.group_id.is_some() {
            let (mut brokers, mut topic, mut group_id) = match config.source {
                SourceConfig::Kafka {
                    brokers,
                    topic,
                    group_id,
                } => (brokers, topic, group_id),
                SourceConfig::File { .. } => (
                    DEFAULT_BROKERS.to_string(),
                    DEFAULT_SOURCE_TOPIC.to_string(),
                    DEFAULT_GROUP_ID.to_string(),
                ),
            };
            if let Some(b) = &self.brokers {
                brokers = b.clone();
            }
            if let Some(t) = self.topic {
                topic = t;
            }
            if let Some(g) = self.group_id {
                group_id = g;
            }
            config.source = SourceConfig::Kafka {
                brokers,
                topic,
                group_id,
            };
        }

        if let Some(topic) = self.output_topic {
            let brokers = self
                .brokers
                .unwrap_or_else(|| DEFAULT_BROKERS.to_string());
            config.sinks.push(SinkConfig::Kafka { brokers, topic });
        }
        if self.no_console {
            config.sinks.retain(|sink| *sink != SinkConfig::Console);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let coordinator = ShutdownCoordinator::new();
    let shutdown = coordinator.subscribe();
    let watcher = coordinator.clone();
    tokio::spawn(async move { watcher.wait_for_signal().await });

    let outcome = match cli.command {
        Commands::Run { args } => match args.into_config() {
            Ok(config) => run_from_config(config, shutdown)
                .await
                .map(|summary| summary.to_string())
                .map_err(Box::<dyn std::error::Error>::from),
            Err(e) => Err(e.into()),
        },
        Commands::Relay { args } => match args.into_config() {
            Ok(config) => RelayJob::run_from_config(config, shutdown)
                .await
                .map(|summary| summary.to_string())
                .map_err(Box::<dyn std::error::Error>::from),
            Err(e) => Err(e.into()),
        },
    };

    match outcome {
        Ok(summary) => {
            info!("Done: {}", summary);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}
