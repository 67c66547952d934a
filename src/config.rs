use std::path::PathBuf;
use std::str::FromStr;

use crate::caller::PathRules;
use crate::env::*;
use crate::format::Format;
use crate::record::{ParseSeverityError, Severity};
use crate::rotating::{parse_size, Retention, RotationPolicy};
use crate::sink::SinkKind;

/// Error type returned when a configuration value is invalid.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidLevel(#[from] ParseSeverityError),

    #[error("invalid size {0:?}, expected e.g. 500m, 10k or a byte count")]
    InvalidSize(String),

    #[error("invalid retention {0:?}, expected e.g. 15d or a file count")]
    InvalidRetention(String),

    #[error("unknown environment {0:?}")]
    InvalidEnvironment(String),

    #[error("at least one sink must be enabled")]
    NoSinks,

    #[error("sink kind {0} configured more than once")]
    DuplicateSink(SinkKind),
}

/// Deployment environment. Outside development, caller paths are also
/// shortened at timestamp-named build folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidEnvironment(s.to_string())),
        }
    }
}

/// How the caller location of each record is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallerMode {
    /// `#[track_caller]` location of the facade call.
    #[default]
    Tracked,
    /// Walk the stack on every call.
    Backtrace,
    Disabled,
}

/// Logger configuration.
///
/// **Fields**
/// - `log_dir`, `file_prefix`: rotated files land in
///   `<log_dir>/<file_prefix>.<date>`.
/// - `json_dump_dir`: root of archived `json_dump` payloads.
/// - `level` / `console_level`: minimum severity of the file and console
///   sinks.
/// - `enable_console` / `enable_file`: which sinks are registered.
/// - `capture_stack`: include `stack` next to `err` for error fields.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub json_dump_dir: PathBuf,
    pub file_prefix: String,
    pub level: Severity,
    pub console_level: Severity,
    pub enable_console: bool,
    pub enable_file: bool,
    pub console_format: Format,
    pub file_format: Format,
    pub rotation: RotationPolicy,
    pub capture_stack: bool,
    pub environment: Environment,
    pub project_root: Option<String>,
    pub caller_mode: CallerMode,
    /// Tint console lines by severity.
    pub console_color: bool,
    /// Log panics through the logger when it is installed globally.
    pub handle_panics: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            json_dump_dir: PathBuf::from("./json_dumps"),
            file_prefix: "app".to_string(),
            level: Severity::Debug,
            console_level: Severity::Debug,
            enable_console: true,
            enable_file: true,
            console_format: Format::Line,
            file_format: Format::Line,
            rotation: RotationPolicy::default(),
            capture_stack: true,
            environment: Environment::Production,
            project_root: Some("app".to_string()),
            caller_mode: CallerMode::Tracked,
            console_color: true,
            handle_panics: false,
        }
    }
}

impl LoggerConfig {
    /// Console sink only; used by the crate-level functions before `init`.
    pub fn console_only() -> Self {
        Self { enable_file: false, ..Self::default() }
    }

    /// Read the configuration from the environment, falling back to the
    /// defaults for unset variables. See [`crate::env`] for the names.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let file_format = if env_flag(LOG_JSON_FILE_ENV, false) { Format::Json } else { Format::Line };
        let rotation = RotationPolicy {
            max_size: Some(parse_size(&env_or(LOG_MAX_SIZE_ENV, "500m"))?),
            retention: Some(env_or(LOG_MAX_FILES_ENV, "15d").parse::<Retention>()?),
            ..RotationPolicy::default()
        };
        let project_root = match std::env::var(LOG_PROJECT_ROOT_ENV) {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => defaults.project_root.clone(),
        };

        Ok(Self {
            log_dir: PathBuf::from(env_or(LOG_DIR_ENV, "./logs")),
            json_dump_dir: PathBuf::from(env_or(JSON_DUMP_DIR_ENV, "./json_dumps")),
            file_prefix: env_or(LOG_FILE_PREFIX_ENV, &defaults.file_prefix),
            level: env_or(LOG_LEVEL_ENV, "debug").parse()?,
            console_level: env_or(CONSOLE_LOG_LEVEL_ENV, "debug").parse()?,
            file_format,
            rotation,
            capture_stack: env_flag(LOG_ERR_STACK_ENV, true),
            environment: env_or(APP_ENV_ENV, "production").parse()?,
            project_root,
            console_color: env_flag(LOG_COLOR_ENV, defaults.console_color),
            handle_panics: env_flag(LOG_HANDLE_PANICS_ENV, defaults.handle_panics),
            ..defaults
        })
    }

    /// Caller path rules implied by this configuration.
    pub fn path_rules(&self) -> PathRules {
        PathRules {
            project_root: self.project_root.clone(),
            detect_build_folder: self.environment != Environment::Development,
            ..PathRules::default()
        }
    }
}
