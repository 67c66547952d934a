use once_cell::sync::{Lazy, OnceCell};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{self, PanicHookInfo};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::caller::CallSite;
use crate::config::{ConfigError, LoggerConfig};
use crate::layer::BridgeLayer;
use crate::logger::Logger;
use crate::record::{ErrorInfo, Payload, Severity};

static LOGGER: OnceCell<Arc<Logger>> = OnceCell::new();

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Used by the crate-level functions until [`init`] has run.
static FALLBACK: Lazy<Logger> = Lazy::new(Logger::console);

/// Error type returned when installing the process-wide logger.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("the global logger is already initialized")]
    AlreadyInitialized,

    #[error("could not create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not set global tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install `logger` as the process-wide logger.
pub fn init_with(logger: Logger) -> Result<Arc<Logger>, InitError> {
    let logger = Arc::new(logger);
    LOGGER
        .set(Arc::clone(&logger))
        .map_err(|_| InitError::AlreadyInitialized)?;
    Ok(logger)
}

/// Build a logger from `config` and install it process-wide.
///
/// **Effects**
///
/// Creates the log directory when file logging is enabled. The payload
/// archive directory is created lazily on the first `json_dump`. With
/// `handle_panics` set, also calls [`install_panic_hook`].
pub fn init(config: LoggerConfig) -> Result<Arc<Logger>, InitError> {
    let logger = init_with(Logger::from_config(&config)?)?;
    if config.handle_panics {
        install_panic_hook();
    }
    Ok(logger)
}

/// [`init`] with [`LoggerConfig::from_env`].
pub fn init_from_env() -> Result<Arc<Logger>, InitError> {
    init(LoggerConfig::from_env()?)
}

/// Install the logger and route `tracing` events through it.
///
/// **Effects**
///
/// Registers a [`Registry`] combined with [`BridgeLayer`] as the global
/// default subscriber, so `tracing::info!` and friends anywhere in the
/// process end up in the same sinks as the facade calls.
pub fn init_tracing(config: LoggerConfig) -> Result<Arc<Logger>, InitError> {
    let logger = init(config)?;
    let subscriber = Registry::default().with(BridgeLayer::new(Arc::clone(&logger)));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(logger)
}

/// The installed logger, or a console-only logger before [`init`].
pub fn global() -> &'static Logger {
    match LOGGER.get() {
        Some(logger) => logger.as_ref(),
        None => &*FALLBACK,
    }
}

/// Log every panic at `error` through [`global`] and flush the sinks,
/// then hand over to the previously installed hook. Only the first call
/// installs anything.
///
/// The record's caller is the panic location; its payload carries the
/// panic message and stack text under `err`/`stack` plus the thread name.
pub fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(global(), info);
            previous(info);
        }));
    });
}

fn log_panic(logger: &Logger, info: &PanicHookInfo<'_>) {
    let message = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    let backtrace = Backtrace::capture();
    let stack = match (backtrace.status(), info.location()) {
        (BacktraceStatus::Captured, _) => format!("{message}\n{backtrace}"),
        (_, Some(location)) => format!("{message}\n    at {location}"),
        (_, None) => message.clone(),
    };
    let thread = std::thread::current();
    let payload = Payload::new()
        .with("thread", thread.name().unwrap_or("<unnamed>"))
        .with_error_info("panic", ErrorInfo::new(message.as_str(), stack));

    let site = match info.location() {
        Some(location) => CallSite::exact(Some(location.file()), Some(location.line())),
        None => CallSite::default(),
    };
    logger.emit_at(Severity::Error, &format!("panicked: {message}"), payload, &site);
    logger.flush();
}

/// Whether [`init`] (or one of its variants) has completed.
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}
