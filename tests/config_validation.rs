//! Configuration loading and validation

#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::time::Duration;

use honchat_protocol::config::{DispatchMode, EngineConfig};
use honchat_protocol::error::{ChatError, ConfigError};
use tempfile::NamedTempFile;

#[test]
fn load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[chat]
port = 11032
protocol = 22
read_timeout = 5000

[master]
max_attempts = 5
"#
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.chat.port, 11032);
    assert_eq!(config.chat.protocol, 22);
    assert_eq!(config.chat.read_timeout, Duration::from_secs(5));
    assert_eq!(config.master.max_attempts, 5);
    assert_eq!(config.chat.dispatch, DispatchMode::Ordered);
    assert!(config.validate().is_empty());
}

#[test]
fn save_and_reload() {
    let file = NamedTempFile::new().unwrap();
    let config = EngineConfig::default_with_overrides(|c| {
        c.chat.invisible = true;
        c.chat.dispatch = DispatchMode::Parallel { max_in_flight: 8 };
        c.logging.json_format = true;
    });
    config.save_to_file(file.path()).unwrap();

    let reloaded = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn missing_file_is_a_config_error() {
    let err = EngineConfig::from_file("/nonexistent/honchat.toml").unwrap_err();
    assert!(matches!(err, ChatError::Config(ConfigError::Invalid(_))));
}

#[test]
fn bad_toml_is_a_config_error() {
    let err = EngineConfig::from_toml("[chat]\nport = \"eleven\"").unwrap_err();
    assert!(matches!(err, ChatError::Config(ConfigError::Invalid(_))));
}

#[test]
fn invalid_values_are_all_reported() {
    let config = EngineConfig::default_with_overrides(|c| {
        c.chat.auth_poll_attempts = 0;
        c.chat.read_buffer_size = 16;
        c.master.master_url = "ftp://example.com".into();
    });
    let errors = config.validate();
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(config.validate_strict().is_err());
}
