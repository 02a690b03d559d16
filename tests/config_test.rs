//! Integration tests for configuration loading

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use vehicle_transit::infra::Config;
use vehicle_transit::services::CrossingPolicy;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[broker]
endpoint = "mqtt://broker.test:1884"
topic = "junction-4/traffic"
username = "edge"
password = "secret"
poll_interval_ms = 50
stats_interval_ms = 0

[zones]
labels = ["E", "W"]
policy = "every_exit"

[report]
matrix_interval_secs = 30
publish_transits = false

[embedded_broker]
enabled = true
port = 18830
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker_endpoint(), "mqtt://broker.test:1884");
    assert_eq!(config.broker_topic(), "junction-4/traffic");
    assert_eq!(config.zone_catalog().labels(), &["E", "W"]);
    assert_eq!(config.crossing_policy(), CrossingPolicy::EveryExit);
    assert_eq!(config.matrix_interval_secs(), 30);
    assert!(!config.publish_transits());
    assert!(config.print_matrix());
    assert!(config.embedded_broker_enabled());
    assert_eq!(config.embedded_broker_bind_address(), "127.0.0.1");
    assert_eq!(config.embedded_broker_port(), 18830);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());

    let publisher = config.publisher_config();
    assert_eq!(publisher.poll_interval, Duration::from_millis(50));
    assert_eq!(publisher.stats_interval, None);
    assert_eq!(publisher.username.as_deref(), Some("edge"));
    assert!(publisher.mqtt_options().is_ok());
}

#[test]
fn test_invalid_zone_labels_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[zones]\nlabels = [\"N\", \"N\"]\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("duplicate zone label"));
}

#[test]
fn test_malformed_toml_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[broker\nendpoint = ").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.broker_endpoint(), "localhost:1883");
    assert_eq!(config.broker_topic(), "vehicletraffic");
    assert_eq!(config.zone_catalog().len(), 5);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.crossing_policy(), CrossingPolicy::FirstExitOnly);
    assert_eq!(config.zone_catalog().labels(), &["N", "NE", "SE", "SW", "NW"]);
}
