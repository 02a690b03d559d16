//! Configuration loading from TOML files
//!
//! The binary selects the file via `--config <path>`, then the CONFIG_FILE
//! environment variable, then `config/dev.toml`; on any load error the
//! defaults below are used.
//!
//! Every key has a default, so a partial file is valid.

use crate::domain::zones::{ZoneCatalog, DEFAULT_ZONES};
use crate::io::publisher::PublisherConfig;
use crate::services::transit::CrossingPolicy;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// `host:port`, optionally `mqtt://host:port`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_bootstrap_timeout_ms")]
    pub bootstrap_timeout_ms: u64,
    #[serde(default = "default_bootstrap_grace_ms")]
    pub bootstrap_grace_ms: u64,
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// Delivery statistics period (0 to disable)
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            topic: default_topic(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            bootstrap_timeout_ms: default_bootstrap_timeout_ms(),
            bootstrap_grace_ms: default_bootstrap_grace_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

fn default_endpoint() -> String {
    "localhost:1883".to_string()
}

fn default_topic() -> String {
    "vehicletraffic".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_bootstrap_timeout_ms() -> u64 {
    5000
}

fn default_bootstrap_grace_ms() -> u64 {
    250
}

fn default_flush_timeout_ms() -> u64 {
    2000
}

fn default_stats_interval_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZonesConfig {
    /// Ordered zone labels; matrix rows and columns follow this order
    #[serde(default = "default_zone_labels")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub policy: CrossingPolicy,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self { labels: default_zone_labels(), policy: CrossingPolicy::default() }
    }
}

fn default_zone_labels() -> Vec<String> {
    DEFAULT_ZONES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Interval for publishing matrix snapshots (0 to disable)
    #[serde(default = "default_matrix_interval_secs")]
    pub matrix_interval_secs: u64,
    /// Publish one message per completed transit
    #[serde(default = "default_true")]
    pub publish_transits: bool,
    /// Print the crossing matrix to stdout on exit
    #[serde(default = "default_true")]
    pub print_matrix: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            matrix_interval_secs: default_matrix_interval_secs(),
            publish_transits: true,
            print_matrix: true,
        }
    }
}

fn default_matrix_interval_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedBrokerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_broker_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

impl Default for EmbeddedBrokerConfig {
    fn default() -> Self {
        Self { enabled: false, bind_address: default_broker_bind_address(), port: default_broker_port() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub embedded_broker: EmbeddedBrokerConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    broker: BrokerConfig,
    zone_catalog: ZoneCatalog,
    crossing_policy: CrossingPolicy,
    matrix_interval_secs: u64,
    publish_transits: bool,
    print_matrix: bool,
    embedded_broker_enabled: bool,
    embedded_broker_bind_address: String,
    embedded_broker_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        let toml_config = TomlConfig::default();
        Self {
            broker: toml_config.broker,
            zone_catalog: ZoneCatalog::default(),
            crossing_policy: toml_config.zones.policy,
            matrix_interval_secs: toml_config.report.matrix_interval_secs,
            publish_transits: toml_config.report.publish_transits,
            print_matrix: toml_config.report.print_matrix,
            embedded_broker_enabled: toml_config.embedded_broker.enabled,
            embedded_broker_bind_address: toml_config.embedded_broker.bind_address,
            embedded_broker_port: toml_config.embedded_broker.port,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let zone_catalog = ZoneCatalog::new(toml_config.zones.labels)
            .with_context(|| format!("Invalid [zones] in config file {}", path.display()))?;

        Ok(Self {
            broker: toml_config.broker,
            zone_catalog,
            crossing_policy: toml_config.zones.policy,
            matrix_interval_secs: toml_config.report.matrix_interval_secs,
            publish_transits: toml_config.report.publish_transits,
            print_matrix: toml_config.report.print_matrix,
            embedded_broker_enabled: toml_config.embedded_broker.enabled,
            embedded_broker_bind_address: toml_config.embedded_broker.bind_address,
            embedded_broker_port: toml_config.embedded_broker.port,
            config_file: path.display().to_string(),
        })
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Publisher settings derived from `[broker]`
    pub fn publisher_config(&self) -> PublisherConfig {
        let b = &self.broker;
        let mut config = PublisherConfig::new(b.endpoint.clone(), b.topic.clone());
        config.client_id = b.client_id.clone();
        config.username = b.username.clone();
        config.password = b.password.clone();
        config.keep_alive = Duration::from_secs(b.keep_alive_secs);
        config.queue_capacity = b.queue_capacity;
        config.poll_interval = Duration::from_millis(b.poll_interval_ms);
        config.connect_timeout = Duration::from_millis(b.connect_timeout_ms);
        config.bootstrap_timeout = Duration::from_millis(b.bootstrap_timeout_ms);
        config.bootstrap_grace = Duration::from_millis(b.bootstrap_grace_ms);
        config.flush_timeout = Duration::from_millis(b.flush_timeout_ms);
        config.stats_interval = match b.stats_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        config
    }

    pub fn broker_endpoint(&self) -> &str {
        &self.broker.endpoint
    }

    pub fn broker_topic(&self) -> &str {
        &self.broker.topic
    }

    pub fn zone_catalog(&self) -> &ZoneCatalog {
        &self.zone_catalog
    }

    pub fn crossing_policy(&self) -> CrossingPolicy {
        self.crossing_policy
    }

    pub fn matrix_interval_secs(&self) -> u64 {
        self.matrix_interval_secs
    }

    pub fn publish_transits(&self) -> bool {
        self.publish_transits
    }

    pub fn print_matrix(&self) -> bool {
        self.print_matrix
    }

    pub fn embedded_broker_enabled(&self) -> bool {
        self.embedded_broker_enabled
    }

    pub fn embedded_broker_bind_address(&self) -> &str {
        &self.embedded_broker_bind_address
    }

    pub fn embedded_broker_port(&self) -> u16 {
        self.embedded_broker_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.broker_endpoint(), "localhost:1883");
        assert_eq!(config.broker_topic(), "vehicletraffic");
        assert_eq!(config.zone_catalog().labels(), &["N", "NE", "SE", "SW", "NW"]);
        assert_eq!(config.crossing_policy(), CrossingPolicy::FirstExitOnly);
        assert_eq!(config.matrix_interval_secs(), 10);
        assert!(config.publish_transits());
        assert!(!config.embedded_broker_enabled());
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_publisher_config_from_defaults() {
        let publisher = Config::default().publisher_config();
        assert_eq!(publisher.endpoint, "localhost:1883");
        assert_eq!(publisher.topic, "vehicletraffic");
        assert_eq!(publisher.poll_interval, Duration::from_millis(100));
        assert_eq!(publisher.stats_interval, Some(Duration::from_secs(60)));
        assert_eq!(publisher.queue_capacity, 1000);
        assert!(publisher.mqtt_options().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[broker]
topic = "site-7/traffic"
stats_interval_ms = 0

[zones]
policy = "every_exit"
"#,
        )
        .unwrap();

        assert_eq!(toml_config.broker.topic, "site-7/traffic");
        assert_eq!(toml_config.broker.endpoint, "localhost:1883");
        assert_eq!(toml_config.broker.stats_interval_ms, 0);
        assert_eq!(toml_config.zones.policy, CrossingPolicy::EveryExit);
        assert_eq!(toml_config.zones.labels.len(), 5);
        assert!(toml_config.report.print_matrix);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result: Result<TomlConfig, _> = toml::from_str("[zones]\npolicy = \"sometimes\"\n");
        assert!(result.is_err());
    }
}
