use std::fmt::Display;
use std::fs;
use std::panic::Location;
use std::sync::Arc;

use crate::archive::{FsPayloadStore, PayloadArchiver};
use crate::caller::{
    BacktraceResolver, CallSite, CallerResolver, DisabledResolver, TrackedResolver, FACADE_DEPTH,
};
use crate::config::{CallerMode, LoggerConfig};
use crate::console::ConsoleSink;
use crate::control::LevelController;
use crate::init::InitError;
use crate::normalize::Normalizer;
use crate::record::{Payload, Severity};
use crate::registry::{LevelTarget, SinkEntry, SinkRegistry};
use crate::rotating::RotatingFileSink;
use crate::sink::{SinkConfig, SinkKind};

/// The logging facade.
///
/// Every method takes exactly two arguments, the message and a payload;
/// anything structured goes into the payload. Calls never fail and never
/// panic; problems along the way only reduce what ends up in the line.
///
/// ```no_run
/// use serde_json::json;
/// use stacklog::{config::LoggerConfig, logger::Logger};
///
/// let logger = Logger::from_config(&LoggerConfig::console_only()).unwrap();
/// logger.info("user created", json!({ "userId": 42 }));
/// logger.debug("cache warm", ());
/// ```
pub struct Logger {
    normalizer: Normalizer,
    registry: Arc<SinkRegistry>,
}

impl Logger {
    pub fn new(normalizer: Normalizer, registry: Arc<SinkRegistry>) -> Self {
        Logger { normalizer, registry }
    }

    /// Console-only logger with default settings.
    pub fn console() -> Self {
        let config = LoggerConfig::console_only();
        let entry = SinkEntry::new(
            SinkConfig::new(SinkKind::Console, config.console_level, config.console_format),
            Arc::new(ConsoleSink::new().with_color(config.console_color)),
        );
        Logger::new(normalizer_for(&config), Arc::new(SinkRegistry::single(entry)))
    }

    /// Build the console and rotating-file sinks enabled in `config`,
    /// creating the log directory when needed.
    pub fn from_config(config: &LoggerConfig) -> Result<Self, InitError> {
        let mut entries = Vec::with_capacity(2);
        if config.enable_console {
            entries.push(SinkEntry::new(
                SinkConfig::new(SinkKind::Console, config.console_level, config.console_format),
                Arc::new(ConsoleSink::new().with_color(config.console_color)),
            ));
        }
        if config.enable_file {
            fs::create_dir_all(&config.log_dir).map_err(|source| InitError::CreateDir {
                path: config.log_dir.clone(),
                source,
            })?;
            let sink = RotatingFileSink::new(&config.log_dir, &config.file_prefix, config.rotation.clone());
            entries.push(SinkEntry::new(
                SinkConfig::new(SinkKind::RotatingFile, config.level, config.file_format),
                Arc::new(sink),
            ));
        }
        let registry = SinkRegistry::new(entries)?;
        Ok(Logger::new(normalizer_for(config), Arc::new(registry)))
    }

    #[track_caller]
    pub fn debug(&self, message: impl Display, payload: impl Into<Payload>) {
        self.emit(Severity::Debug, message.to_string(), payload.into(), Location::caller());
    }

    #[track_caller]
    pub fn info(&self, message: impl Display, payload: impl Into<Payload>) {
        self.emit(Severity::Info, message.to_string(), payload.into(), Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, message: impl Display, payload: impl Into<Payload>) {
        self.emit(Severity::Warn, message.to_string(), payload.into(), Location::caller());
    }

    #[track_caller]
    pub fn error(&self, message: impl Display, payload: impl Into<Payload>) {
        self.emit(Severity::Error, message.to_string(), payload.into(), Location::caller());
    }

    /// Alias for [`Logger::debug`].
    #[track_caller]
    pub fn log(&self, message: impl Display, payload: impl Into<Payload>) {
        self.emit(Severity::Debug, message.to_string(), payload.into(), Location::caller());
    }

    /// Shared tail of all facade methods, including the crate-level ones.
    /// Both call it directly so they sit at the same stack depth.
    pub(crate) fn emit(
        &self,
        severity: Severity,
        message: String,
        payload: Payload,
        location: &'static Location<'static>,
    ) {
        let site = CallSite::tracked(location, FACADE_DEPTH);
        self.emit_at(severity, &message, payload, &site);
    }

    /// Normalize and dispatch with an explicit call site.
    pub fn emit_at(&self, severity: Severity, message: &str, payload: Payload, site: &CallSite) {
        let record = self.normalizer.normalize(severity, message, payload, site);
        self.registry.dispatch(&record);
    }

    pub fn registry(&self) -> &Arc<SinkRegistry> {
        &self.registry
    }

    pub fn controller(&self) -> LevelController {
        LevelController::new(Arc::clone(&self.registry))
    }

    pub fn set_level(&self, level: Severity, target: LevelTarget) {
        self.registry.set_level(level, target);
    }

    /// Flush all sinks. Call before the process exits.
    pub fn flush(&self) {
        self.registry.flush();
    }
}

fn normalizer_for(config: &LoggerConfig) -> Normalizer {
    let rules = config.path_rules();
    let resolver: Arc<dyn CallerResolver> = match config.caller_mode {
        CallerMode::Tracked => Arc::new(TrackedResolver::new(rules)),
        CallerMode::Backtrace => Arc::new(BacktraceResolver::new(rules)),
        CallerMode::Disabled => Arc::new(DisabledResolver),
    };
    let archiver = PayloadArchiver::new(Arc::new(FsPayloadStore::new(&config.json_dump_dir)));
    Normalizer::new(resolver)
        .with_archiver(archiver)
        .with_stack_capture(config.capture_stack)
}
