//! Environment-driven configuration. Kept in its own test binary with a
//! single test, so no other test reads the environment while it is being
//! changed.

use std::path::PathBuf;

use stacklog::config::{ConfigError, Environment, LoggerConfig};
use stacklog::env::*;
use stacklog::format::Format;
use stacklog::rotating::Retention;
use stacklog::Severity;

const KEYS: [&str; 9] = [
    LOG_DIR_ENV,
    LOG_LEVEL_ENV,
    CONSOLE_LOG_LEVEL_ENV,
    LOG_JSON_FILE_ENV,
    LOG_MAX_FILES_ENV,
    APP_ENV_ENV,
    LOG_COLOR_ENV,
    LOG_HANDLE_PANICS_ENV,
    LOG_MAX_SIZE_ENV,
];

#[test]
fn reads_environment() {
    for key in KEYS {
        std::env::remove_var(key);
    }
    let defaults = LoggerConfig::from_env().unwrap();
    assert!(defaults.console_color);
    assert!(!defaults.handle_panics);
    assert_eq!(defaults.level, Severity::Debug);

    std::env::set_var(LOG_DIR_ENV, "/var/log/orders");
    std::env::set_var(LOG_LEVEL_ENV, "warn");
    std::env::set_var(CONSOLE_LOG_LEVEL_ENV, "ERROR");
    std::env::set_var(LOG_JSON_FILE_ENV, "1");
    std::env::set_var(LOG_MAX_FILES_ENV, "7");
    std::env::set_var(APP_ENV_ENV, "development");
    std::env::set_var(LOG_COLOR_ENV, "false");
    std::env::set_var(LOG_HANDLE_PANICS_ENV, "true");

    let config = LoggerConfig::from_env().unwrap();
    assert_eq!(config.log_dir, PathBuf::from("/var/log/orders"));
    assert_eq!(config.level, Severity::Warn);
    assert_eq!(config.console_level, Severity::Error);
    assert_eq!(config.file_format, Format::Json);
    assert_eq!(config.rotation.retention, Some(Retention::Count(7)));
    assert_eq!(config.environment, Environment::Development);
    assert!(!config.console_color);
    assert!(config.handle_panics);

    std::env::set_var(LOG_LEVEL_ENV, "loud");
    assert!(matches!(LoggerConfig::from_env(), Err(ConfigError::InvalidLevel(_))));

    std::env::set_var(LOG_LEVEL_ENV, "info");
    std::env::set_var(LOG_MAX_SIZE_ENV, "huge");
    assert!(matches!(LoggerConfig::from_env(), Err(ConfigError::InvalidSize(_))));

    for key in KEYS {
        std::env::remove_var(key);
    }
}
