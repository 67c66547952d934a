//! Process-wide structured logging.
//!
//! Every call produces one line with timestamp, process id, level, caller
//! location, message and a JSON payload, routed to a console sink and a
//! date/size-rotated file sink with independent thresholds that can be
//! changed at runtime.
//!
//! ```no_run
//! use serde_json::json;
//!
//! stacklog::init::init_from_env().unwrap();
//! stacklog::info("user created", json!({ "userId": 42 }));
//! ```

pub mod record;
pub mod caller;
pub mod normalize;
pub mod archive;
pub mod format;
pub mod sink;
pub mod registry;
pub mod control;
pub mod logger;

pub mod console;
pub mod rotating;
pub mod buffered;
pub mod noop_sink;

pub mod config;
pub mod env;
pub mod init;
pub mod layer;

use std::fmt::Display;
use std::panic::Location;

pub use crate::logger::Logger;
pub use crate::record::{ErrorInfo, Payload, Severity};
pub use crate::registry::LevelTarget;

#[track_caller]
pub fn debug(message: impl Display, payload: impl Into<Payload>) {
    init::global().emit(Severity::Debug, message.to_string(), payload.into(), Location::caller());
}

#[track_caller]
pub fn info(message: impl Display, payload: impl Into<Payload>) {
    init::global().emit(Severity::Info, message.to_string(), payload.into(), Location::caller());
}

#[track_caller]
pub fn warn(message: impl Display, payload: impl Into<Payload>) {
    init::global().emit(Severity::Warn, message.to_string(), payload.into(), Location::caller());
}

#[track_caller]
pub fn error(message: impl Display, payload: impl Into<Payload>) {
    init::global().emit(Severity::Error, message.to_string(), payload.into(), Location::caller());
}

/// Alias for [`debug`].
#[track_caller]
pub fn log(message: impl Display, payload: impl Into<Payload>) {
    init::global().emit(Severity::Debug, message.to_string(), payload.into(), Location::caller());
}

/// Change the threshold of the global logger's sinks.
pub fn set_level(level: Severity, target: LevelTarget) {
    init::global().set_level(level, target);
}

/// Flush the global logger's sinks.
pub fn flush() {
    init::global().flush();
}
