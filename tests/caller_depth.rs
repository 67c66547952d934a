//! Stack-walking caller resolution through the facade.
//!
//! The walk only sees real frames in unoptimized builds, so these tests are
//! skipped when debug assertions are off.

mod common;

use std::sync::Arc;

use common::{fixed_clock, MemorySink};
use stacklog::caller::{BacktraceResolver, CallSite, CallerResolver, PathRules, FACADE_DEPTH};
use stacklog::format::Format;
use stacklog::init;
use stacklog::normalize::Normalizer;
use stacklog::registry::{SinkEntry, SinkRegistry};
use stacklog::sink::{SinkConfig, SinkKind};
use stacklog::{Logger, Payload, Severity};

/// Hides the tracked location so only the stack walk can produce a caller.
/// Adds one frame of its own on top of the resolver.
struct WalkOnly(BacktraceResolver);

impl CallerResolver for WalkOnly {
    fn resolve(&self, site: &CallSite) -> String {
        let depth = site.depth.map(|d| d + 1);
        self.0.resolve(&CallSite { depth, file: None, line: None })
    }
}

fn walking_logger() -> (Logger, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let registry = SinkRegistry::single(SinkEntry::new(
        SinkConfig::new(SinkKind::Console, Severity::Debug, Format::Json),
        sink.clone(),
    ));
    let normalizer = Normalizer::new(Arc::new(WalkOnly(BacktraceResolver::new(PathRules::default()))))
        .with_clock(fixed_clock());
    (Logger::new(normalizer, Arc::new(registry)), sink)
}

fn filename(sink: &MemorySink, index: usize) -> String {
    let parsed: serde_json::Value = serde_json::from_str(&sink.lines()[index]).unwrap();
    parsed["filename"].as_str().unwrap().to_string()
}

#[test]
#[cfg_attr(not(debug_assertions), ignore)]
fn walk_finds_caller_of_logger_methods() {
    let (logger, sink) = walking_logger();

    let line = line!() + 1;
    logger.info("from method", ());
    logger.error("from method", Payload::new().with("n", 1));

    assert_eq!(filename(&sink, 0), format!("tests/caller_depth.rs:{line}"));
    assert_eq!(filename(&sink, 1), format!("tests/caller_depth.rs:{}", line + 1));
}

#[test]
#[cfg_attr(not(debug_assertions), ignore)]
fn walk_finds_caller_of_emit_at() {
    let (logger, sink) = walking_logger();

    // emit_at sits two frames closer to the resolver than the facade.
    let line = line!() + 1;
    logger.emit_at(Severity::Info, "direct", Payload::Absent, &CallSite { depth: Some(FACADE_DEPTH - 2), file: None, line: None });

    assert_eq!(filename(&sink, 0), format!("tests/caller_depth.rs:{line}"));
}

// Only test in this binary that installs the global logger.
#[test]
#[cfg_attr(not(debug_assertions), ignore)]
fn walk_finds_caller_of_crate_functions() {
    let (logger, sink) = walking_logger();
    init::init_with(logger).unwrap();

    let line = line!() + 1;
    stacklog::info("from function", ());
    stacklog::warn("from function", ());

    assert_eq!(filename(&sink, 0), format!("tests/caller_depth.rs:{line}"));
    assert_eq!(filename(&sink, 1), format!("tests/caller_depth.rs:{}", line + 1));
}
