//! Environment variable names read by [`LoggerConfig::from_env`].
//!
//! These are purely helpers; the core pipeline never touches the
//! environment itself.
//!
//! [`LoggerConfig::from_env`]: crate::config::LoggerConfig::from_env

/// Directory for rotated log files.
pub const LOG_DIR_ENV: &str = "LOG_DIR";

/// Root directory of archived `json_dump` payloads.
pub const JSON_DUMP_DIR_ENV: &str = "JSON_DUMP_DIR";

/// Minimum severity of the file sink.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Minimum severity of the console sink.
pub const CONSOLE_LOG_LEVEL_ENV: &str = "CONSOLE_LOG_LEVEL";

/// `development` or `production`.
pub const APP_ENV_ENV: &str = "APP_ENV";

/// File name prefix of rotated logs.
pub const LOG_FILE_PREFIX_ENV: &str = "LOG_FILE_PREFIX";

/// Write JSON lines instead of the line format to files (`true`/`1`).
pub const LOG_JSON_FILE_ENV: &str = "LOG_JSON_FILE";

/// Size at which a log file rolls over, e.g. `500m`.
pub const LOG_MAX_SIZE_ENV: &str = "LOG_MAX_SIZE";

/// Retention of rotated files: `15d` (days) or `5` (count).
pub const LOG_MAX_FILES_ENV: &str = "LOG_MAX_FILES";

/// Include error stack text in records (`false`/`0` to disable).
pub const LOG_ERR_STACK_ENV: &str = "LOG_ERR_STACK";

/// Directory name after which caller paths are shortened.
pub const LOG_PROJECT_ROOT_ENV: &str = "LOG_PROJECT_ROOT";

/// Colour console lines by severity (`false`/`0` to disable).
pub const LOG_COLOR_ENV: &str = "LOG_COLOR";

/// Log panics through the installed logger (`true`/`1` to enable).
pub const LOG_HANDLE_PANICS_ENV: &str = "LOG_HANDLE_PANICS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag: `true`/`1` and `false`/`0`, anything else is the default.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|v| v.trim().to_ascii_lowercase()) {
        Ok(v) if v == "true" || v == "1" => true,
        Ok(v) if v == "false" || v == "0" => false,
        _ => default,
    }
}
