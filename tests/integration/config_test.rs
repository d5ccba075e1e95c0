use sysfeed::core::config::{Config, DEFAULT_PORT};
use sysfeed::core::monitor::ArimaOrder;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.interval_ms, 1000);
    assert_eq!(config.forecast.order, ArimaOrder::new(2, 1, 2));
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = Config {
        port: 0,
        interval_ms: 250,
        ..Default::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_explicit_config_file_must_parse() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
    assert!(Config::load_from(&temp_dir.path().join("missing.json")).is_err());
}

#[test]
fn test_port_zero_is_valid() {
    let config = Config {
        port: 0,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_values() {
    let empty_host = Config {
        host: "  ".to_string(),
        ..Default::default()
    };
    assert!(empty_host.validate().is_err());

    let zero_capacity = Config {
        channel_capacity: 0,
        ..Default::default()
    };
    assert!(zero_capacity.validate().is_err());

    let mut oversized_order = Config::default();
    oversized_order.forecast.order = ArimaOrder::new(12, 1, 12);
    assert!(oversized_order.validate().is_err());

    let mut no_window = Config::default();
    no_window.forecast.window_capacity = 0;
    assert!(no_window.validate().is_err());
}

#[test]
fn test_config_load_nonexistent_returns_default() {
    // Falls back to defaults if there is no file at the default location;
    // an existing user config is also acceptable here
    assert!(Config::load().is_ok());
}
