#![allow(dead_code)]

use chrono::{DateTime, Local, TimeZone};
use std::sync::{Arc, Mutex};

use stacklog::caller::{CallSite, CallerResolver};
use stacklog::format::Format;
use stacklog::normalize::{Clock, Normalizer};
use stacklog::registry::{SinkEntry, SinkRegistry};
use stacklog::sink::{LogSink, SinkConfig, SinkError, SinkKind};
use stacklog::{Logger, Severity};

/// Sink that keeps every line in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.lines.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

impl LogSink for MemorySink {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        self.lines.lock().unwrap().push((severity, line.to_string()));
        Ok(())
    }
}

/// Resolver that always reports the same location.
pub struct FixedResolver(pub &'static str);

impl CallerResolver for FixedResolver {
    fn resolve(&self, _site: &CallSite) -> String {
        self.0.to_string()
    }
}

pub fn new_year() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn fixed_clock() -> Clock {
    Arc::new(new_year)
}

pub fn fixed_normalizer() -> Normalizer {
    Normalizer::new(Arc::new(FixedResolver("app.js:10")))
        .with_clock(fixed_clock())
        .with_pid(1234)
}

pub struct Harness {
    pub logger: Logger,
    pub console: Arc<MemorySink>,
    pub file: Arc<MemorySink>,
}

/// Logger with an in-memory console (line format) and file (given format).
pub fn harness(console_min: Severity, file_min: Severity, file_format: Format) -> Harness {
    harness_with(fixed_normalizer(), console_min, file_min, file_format)
}

pub fn harness_with(
    normalizer: Normalizer,
    console_min: Severity,
    file_min: Severity,
    file_format: Format,
) -> Harness {
    let console = Arc::new(MemorySink::default());
    let file = Arc::new(MemorySink::default());
    let registry = SinkRegistry::new(vec![
        SinkEntry::new(SinkConfig::new(SinkKind::Console, console_min, Format::Line), console.clone()),
        SinkEntry::new(SinkConfig::new(SinkKind::RotatingFile, file_min, file_format), file.clone()),
    ])
    .unwrap();
    Harness {
        logger: Logger::new(normalizer, Arc::new(registry)),
        console,
        file,
    }
}
