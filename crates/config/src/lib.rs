//! Configuration management for the ASN.1 codec module
//!
//! Settings are layered, lowest precedence first: built-in defaults, the
//! `key = value` configuration file, `ACM_`-prefixed environment variables,
//! and command-line overrides. Module settings use the `asn1.*` keys; every
//! other key in the file is handed to librdkafka untouched.

pub mod offset;
pub mod properties;

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub use offset::StartOffset;
pub use properties::PropertiesFile;

/// Consumed topic
pub const KEY_CONSUMER_TOPIC: &str = "asn1.j2735.topic.consumer";
/// Produced topic
pub const KEY_PRODUCER_TOPIC: &str = "asn1.j2735.topic.producer";
/// Target partition for produced messages
pub const KEY_PARTITION: &str = "asn1.j2735.kafka.partition";
/// Consume timeout in milliseconds
pub const KEY_CONSUMER_TIMEOUT: &str = "asn1.j2735.consumer.timeout.ms";
/// Leading bytes dropped from the first block of the stream
pub const KEY_SKIP_BYTES: &str = "asn1.codec.skip.bytes";

/// Prefix for environment overrides, e.g. `ACM_PRODUCER_TOPIC`
pub const ENV_PREFIX: &str = "ACM_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Parse {
        key: String,
        value: String,
        reason: String,
    },

    #[error("No {0} was specified")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Effective configuration of one transcoder run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Kafka brokers (comma-separated)
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topics to consume; exactly one is supported
    pub consumer_topics: Vec<String>,

    /// Topic that receives the XML output
    pub producer_topic: String,

    /// Target partition for produced messages; `None` lets the partitioner decide
    pub partition: Option<i32>,

    /// Starting position in the consumed topic
    ///
    /// `None` leaves the position to the group's committed offset and any
    /// `auto.offset.reset` passed through to librdkafka.
    pub offset: Option<StartOffset>,

    /// Consume timeout in milliseconds
    pub consumer_timeout_ms: u64,

    /// Stop once every partition has reported end of partition
    pub exit_on_eof: bool,

    /// Number of partitions expected to report end of partition
    pub partition_count: u32,

    /// librdkafka debug contexts
    pub debug: Option<String>,

    /// Leading bytes dropped from the first block of the stream
    pub skip_bytes: usize,

    /// Additional librdkafka properties
    pub kafka: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost".to_string(),
            group_id: "asn1-codec".to_string(),
            consumer_topics: Vec::new(),
            producer_topic: String::new(),
            partition: None,
            offset: None,
            consumer_timeout_ms: 500,
            exit_on_eof: false,
            partition_count: 1,
            debug: None,
            skip_bytes: 0,
            kafka: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file, the environment and command-line overrides
    ///
    /// The result is not validated; call [`PipelineConfig::validate`] before use.
    pub fn load(config_path: impl AsRef<Path>, overrides: ConfigOverrides) -> Result<Self> {
        let file = PropertiesFile::load(config_path)?;
        let file_layer = ConfigOverrides::from_properties(&file)?;
        Self::from_layers(file_layer, overrides)
    }

    /// Merge a file layer and a command-line layer over the defaults
    pub fn from_layers(file_layer: ConfigOverrides, overrides: ConfigOverrides) -> Result<Self> {
        Figment::from(Serialized::defaults(PipelineConfig::default()))
            .merge(Serialized::defaults(file_layer))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Broker list must not be empty".to_string(),
            ));
        }

        match self.consumer_topics.as_slice() {
            [] => return Err(ConfigError::Missing("consumer topic")),
            [topic] if topic.trim().is_empty() => {
                return Err(ConfigError::Missing("consumer topic"))
            }
            [_] => {}
            topics => {
                return Err(ConfigError::ValidationError(format!(
                    "Exactly one consumer topic is supported, got {}",
                    topics.len()
                )))
            }
        }

        if self.producer_topic.trim().is_empty() {
            return Err(ConfigError::Missing("publisher topic"));
        }

        if self.consumer_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Consumer timeout must be greater than 0".to_string(),
            ));
        }

        if self.partition_count == 0 {
            return Err(ConfigError::ValidationError(
                "Partition count must be greater than 0".to_string(),
            ));
        }

        if let Some(partition) = self.partition {
            if partition < 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid partition {}",
                    partition
                )));
            }
        }

        Ok(())
    }

    /// Consume timeout as a duration
    pub fn consumer_timeout(&self) -> Duration {
        Duration::from_millis(self.consumer_timeout_ms)
    }

    /// Effective settings, module settings first, then librdkafka properties
    pub fn describe(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.brokers.clone()),
            ("group.id".to_string(), self.group_id.clone()),
            (KEY_CONSUMER_TOPIC.to_string(), self.consumer_topics.join(",")),
            (KEY_PRODUCER_TOPIC.to_string(), self.producer_topic.clone()),
            (
                KEY_PARTITION.to_string(),
                self.partition
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "unassigned".to_string()),
            ),
            (
                KEY_CONSUMER_TIMEOUT.to_string(),
                self.consumer_timeout_ms.to_string(),
            ),
            ("exit.on.eof".to_string(), self.exit_on_eof.to_string()),
            ("partition.count".to_string(), self.partition_count.to_string()),
            (KEY_SKIP_BYTES.to_string(), self.skip_bytes.to_string()),
        ];

        if let Some(offset) = &self.offset {
            settings.push(("offset".to_string(), offset.to_string()));
        }

        if let Some(debug) = &self.debug {
            settings.push(("debug".to_string(), debug.clone()));
        }

        settings.extend(self.kafka.iter().map(|(k, v)| (k.clone(), v.clone())));
        settings
    }
}

/// One layer of optional settings
///
/// Unset fields leave lower layers untouched when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brokers: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_topics: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<StartOffset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_on_eof: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_bytes: Option<usize>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub kafka: BTreeMap<String, String>,
}

impl ConfigOverrides {
    /// Build the file layer from parsed configuration file settings
    ///
    /// Numeric module settings that do not parse are an error rather than
    /// falling back to defaults.
    pub fn from_properties(file: &PropertiesFile) -> Result<Self> {
        let mut layer = Self::default();

        for (key, value) in file.entries() {
            match key.as_str() {
                KEY_CONSUMER_TOPIC => layer.consumer_topics = Some(vec![value.clone()]),
                KEY_PRODUCER_TOPIC => layer.producer_topic = Some(value.clone()),
                KEY_PARTITION => layer.partition = Some(parse_number(key, value)?),
                KEY_CONSUMER_TIMEOUT => {
                    layer.consumer_timeout_ms = Some(parse_number(key, value)?)
                }
                KEY_SKIP_BYTES => layer.skip_bytes = Some(parse_number(key, value)?),
                "metadata.broker.list" | "bootstrap.servers" => {
                    layer.brokers = Some(value.clone())
                }
                "group.id" => layer.group_id = Some(value.clone()),
                "debug" => layer.debug = Some(value.clone()),
                module_key if module_key.starts_with("asn1.") => {
                    tracing::warn!(key = %module_key, "Ignoring unrecognised ASN1 codec setting");
                }
                _ => {
                    layer.kafka.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(layer)
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Parse {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
