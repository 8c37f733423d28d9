//! Integration tests for configuration system

use std::time::Duration;

use conduit_core::config::{sample_config, BufferConfig, ConfigFile, DriverConfig};
use conduit_core::error::ConduitError;
use conduit_core::params::ParamValue;
use tempfile::TempDir;

#[test]
fn test_config_file_default() {
    let config = ConfigFile::default();
    assert_eq!(config.driver, DriverConfig::default());
    assert_eq!(config.buffers, BufferConfig::default());
    assert_eq!(config.driver.poll_interval(), Duration::from_millis(5));
    assert_eq!(config.buffers.unit_capacity, 64 * 1024);
    assert!(config.nodes.is_empty());
}

#[test]
fn test_config_file_sample_parses() {
    let config: ConfigFile = toml::from_str(&sample_config()).expect("sample parses");
    assert_eq!(config.driver.poll_interval_ms, 5);
    assert!(config.driver.max_idle_polls.is_none());

    let clamp = config.node_parameters("clamp").expect("clamp table");
    assert_eq!(clamp.get("max_width"), Some(&ParamValue::Int(1280)));
    assert_eq!(
        config.node_parameters("gain").and_then(|p| p.get("gain_db")),
        Some(&ParamValue::Float(0.0))
    );
}

#[test]
fn test_config_file_save_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = ConfigFile::default();
    config.driver = DriverConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_max_idle_polls(500);
    config.buffers.unit_capacity = 188 * 7;
    config.set_node_parameter("framerate", "fps", ParamValue::Int(25));
    config.set_node_parameter("gain", "gain_db", ParamValue::Float(-3.5));

    config.save_to(path.clone()).expect("save");
    let loaded = ConfigFile::load_from(path).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn test_config_file_load_nonexistent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = ConfigFile::load_from(temp_dir.path().join("missing.toml")).expect("defaults");
    assert_eq!(config, ConfigFile::default());
}

#[test]
fn test_config_file_partial_sections() {
    let config: ConfigFile = toml::from_str("[driver]\nmax_idle_polls = 10\n").unwrap();
    assert_eq!(config.driver.max_idle_polls, Some(10));
    assert_eq!(config.driver.poll_interval_ms, 5);
    assert_eq!(config.buffers, BufferConfig::default());
}

#[test]
fn test_config_file_rejects_bad_input() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let broken = temp_dir.path().join("broken.toml");
    std::fs::write(&broken, "[driver\npoll_interval_ms = ").unwrap();
    let err = ConfigFile::load_from(broken).unwrap_err();
    assert!(matches!(err, ConduitError::Config(_)));

    let zero = temp_dir.path().join("zero.toml");
    std::fs::write(&zero, "[driver]\nmax_idle_polls = 0\n").unwrap();
    assert!(ConfigFile::load_from(zero).is_err());
}
