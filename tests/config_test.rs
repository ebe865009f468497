//! Tests for configuration loading from files and the environment

use std::io::Write;
use std::time::Duration;

use anthias_fleet::config::Config;
use serial_test::serial;
use tempfile::NamedTempFile;

const FLEET_VARS: &[&str] = &[
    "FLEET_NAME",
    "FLEET_MANAGER_URL",
    "FLEET_TOKEN",
    "FLEET_REQUEST_TIMEOUT",
    "FLEET_SCAN_INTERVAL",
    "FLEET_MAX_CONCURRENT_PLAYERS",
    "FLEET_ABORT_ON_SUBFETCH_AUTH_FAILURE",
    "FLEET_MEDIA_TTL",
    "FLEET_BIND_ADDRESS",
    "FLEET_LOG_LEVEL",
    "FLEET_LOG_FORMAT",
];

fn clear_env() {
    for var in FLEET_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_example_config_parses() {
    let config = Config::from_file(std::path::Path::new("config.example.toml")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.scan_interval(), Duration::from_secs(60));
    assert_eq!(config.media_ttl(), Duration::from_secs(300));
}

#[test]
#[serial]
fn test_from_file() {
    clear_env();
    let file = write_config(
        r#"
        [fleet_manager]
        name = "lobby"
        url = "https://fm.example.com/"
        token = "file-token"
        request_timeout_secs = 5

        [poller]
        scan_interval_secs = 30
        max_concurrent_players = 8
        abort_on_subfetch_auth_failure = true

        [server]
        bind_address = "0.0.0.0:9000"
        "#,
    );

    let config = Config::from_file(file.path()).unwrap();
    config.validate_with_token().unwrap();

    assert_eq!(config.fleet_manager.name, "lobby");
    assert_eq!(config.fleet_manager.token, "file-token");
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.bind_address().unwrap().port(), 9000);

    let poller = config.poller_config();
    assert_eq!(poller.scan_interval, Duration::from_secs(30));
    assert_eq!(poller.builder.max_concurrent_players, 8);
    assert!(poller.builder.abort_on_subfetch_auth_failure);
}

#[test]
#[serial]
fn test_file_without_token_reads_env() {
    clear_env();
    std::env::set_var("FLEET_TOKEN", "env-token");

    let file = write_config(
        r#"
        [fleet_manager]
        url = "https://fm.example.com"
        "#,
    );
    let config = Config::from_file(file.path()).unwrap();
    clear_env();

    assert_eq!(config.fleet_manager.token, "env-token");
}

#[test]
#[serial]
fn test_from_env() {
    clear_env();
    std::env::set_var("FLEET_MANAGER_URL", "https://fm.example.com");
    std::env::set_var("FLEET_TOKEN", "abc");
    std::env::set_var("FLEET_SCAN_INTERVAL", "15");
    std::env::set_var("FLEET_MAX_CONCURRENT_PLAYERS", "2");
    std::env::set_var("FLEET_MEDIA_TTL", "60");
    std::env::set_var("FLEET_LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    clear_env();

    config.validate_with_token().unwrap();
    assert_eq!(config.fleet_manager.url, "https://fm.example.com");
    assert_eq!(config.scan_interval(), Duration::from_secs(15));
    assert_eq!(config.poller.max_concurrent_players, 2);
    assert_eq!(config.media_ttl(), Duration::from_secs(60));
    assert_eq!(config.logging.format, "json");
    // Unset values keep their defaults
    assert_eq!(config.request_timeout(), Duration::from_secs(15));
}

#[test]
#[serial]
fn test_unparsable_env_values_fall_back() {
    clear_env();
    std::env::set_var("FLEET_SCAN_INTERVAL", "soon");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.scan_interval(), Duration::from_secs(60));
}

#[test]
fn test_invalid_file_is_an_error() {
    let file = write_config("[poller]\nscan_interval_secs = \"often\"\n");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML config file"));

    assert!(Config::from_file(std::path::Path::new("/nonexistent/fleet.toml")).is_err());
}
