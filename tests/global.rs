mod common;

use serde_json::json;
use std::sync::Arc;

use common::{fixed_clock, MemorySink};
use stacklog::format::Format;
use stacklog::init::{self, InitError};
use stacklog::normalize::Normalizer;
use stacklog::registry::{SinkEntry, SinkRegistry};
use stacklog::sink::{SinkConfig, SinkKind};
use stacklog::{LevelTarget, Logger, Severity};

// The global logger can only be installed once per process, so the whole
// lifecycle lives in a single test.
#[test]
fn crate_level_functions_use_installed_logger() {
    assert!(!init::is_initialized());
    // Falls back to a console logger instead of failing.
    stacklog::debug("before init", ());

    let sink = Arc::new(MemorySink::default());
    let registry = SinkRegistry::single(SinkEntry::new(
        SinkConfig::new(SinkKind::Console, Severity::Debug, Format::Line),
        sink.clone(),
    ));
    let normalizer = Normalizer::default().with_clock(fixed_clock()).with_pid(77);
    init::init_with(Logger::new(normalizer, Arc::new(registry))).unwrap();
    assert!(init::is_initialized());

    let line = line!() + 1;
    stacklog::info("user created", json!({ "userId": 42 }));
    stacklog::log("alias", ());

    let lines = sink.lines();
    assert_eq!(
        lines[0],
        format!(r#"2024-01-01 00:00:00 :: [77] :: info :: tests/global.rs:{line} :: user created :: {{"userId":42}}"#)
    );
    assert!(lines[1].contains(" :: debug :: tests/global.rs:"));

    stacklog::set_level(Severity::Error, LevelTarget::Console);
    stacklog::warn("quiet now", ());
    stacklog::error("still loud", ());
    stacklog::flush();
    assert_eq!(sink.severities(), vec![Severity::Info, Severity::Debug, Severity::Error]);

    let again = init::init_with(Logger::console());
    assert!(matches!(again, Err(InitError::AlreadyInitialized)));
}
