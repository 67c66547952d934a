use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::ConfigError;
use crate::format::{format_record, Format};
use crate::record::{CanonicalRecord, Severity};
use crate::sink::{LogSink, SinkConfig, SinkKind};

/// Which sinks a level change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelTarget {
    File,
    Console,
    #[default]
    Both,
}

impl LevelTarget {
    pub fn matches(&self, kind: SinkKind) -> bool {
        match self {
            LevelTarget::File => kind == SinkKind::RotatingFile,
            LevelTarget::Console => kind == SinkKind::Console,
            LevelTarget::Both => true,
        }
    }
}

/// A registered sink together with its configuration.
#[derive(Clone)]
pub struct SinkEntry {
    pub config: SinkConfig,
    pub sink: Arc<dyn LogSink>,
}

impl SinkEntry {
    pub fn new(config: SinkConfig, sink: Arc<dyn LogSink>) -> Self {
        SinkEntry { config, sink }
    }
}

/// One immutable generation of the sink set.
#[derive(Clone)]
pub struct LogState {
    entries: Vec<SinkEntry>,
    generation: u64,
}

impl LogState {
    pub fn entries(&self) -> &[SinkEntry] {
        &self.entries
    }

    /// Incremented on every level change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self, kind: SinkKind) -> Option<SinkConfig> {
        self.entries.iter().find(|e| e.config.kind == kind).map(|e| e.config)
    }
}

/// Ordered set of sinks with per-sink thresholds.
///
/// The sink set lives behind an [`ArcSwap`]: `dispatch` works on the
/// snapshot it loaded, `set_level` publishes a complete new [`LogState`]
/// in a single store, so no dispatch ever sees a partially updated set.
pub struct SinkRegistry {
    state: ArcSwap<LogState>,
    write_errors: AtomicU64,
}

impl SinkRegistry {
    /// Build a registry from at least one sink, with at most one sink per
    /// kind.
    pub fn new(entries: Vec<SinkEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoSinks);
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.config.kind == entry.config.kind) {
                return Err(ConfigError::DuplicateSink(entry.config.kind));
            }
        }
        Ok(SinkRegistry {
            state: ArcSwap::from_pointee(LogState { entries, generation: 0 }),
            write_errors: AtomicU64::new(0),
        })
    }

    /// Registry holding exactly one sink.
    pub fn single(entry: SinkEntry) -> Self {
        SinkRegistry {
            state: ArcSwap::from_pointee(LogState { entries: vec![entry], generation: 0 }),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Current sink set.
    pub fn snapshot(&self) -> Arc<LogState> {
        self.state.load_full()
    }

    /// Number of sink writes that failed since creation.
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Write `record` to every sink whose threshold it meets. Each format
    /// is rendered at most once per record.
    pub fn dispatch(&self, record: &CanonicalRecord) {
        let state = self.state.load();
        let mut rendered: HashMap<Format, String> = HashMap::new();

        for entry in state.entries.iter() {
            if !entry.config.accepts(record.severity) {
                continue;
            }
            let line = rendered
                .entry(entry.config.format)
                .or_insert_with(|| format_record(record, entry.config.format));
            if let Err(e) = entry.sink.write(record.severity, line) {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(sink = %entry.config.kind, error = %e, "log sink write failed");
            }
        }
    }

    /// Replace the threshold of the targeted sinks. Sinks keep their
    /// handles; their configs are rebuilt and the whole set is swapped in
    /// one step.
    pub fn set_level(&self, level: Severity, target: LevelTarget) {
        self.state.rcu(|current| {
            let entries = current
                .entries
                .iter()
                .map(|entry| {
                    let config = if target.matches(entry.config.kind) {
                        SinkConfig::new(entry.config.kind, level, entry.config.format)
                    } else {
                        entry.config
                    };
                    SinkEntry::new(config, Arc::clone(&entry.sink))
                })
                .collect();
            LogState { entries, generation: current.generation + 1 }
        });
        tracing::info!(level = %level, target = ?target, "log level updated");
    }

    /// Flush every sink, reporting failures.
    pub fn flush(&self) {
        for entry in self.state.load().entries.iter() {
            if let Err(e) = entry.sink.flush() {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(sink = %entry.config.kind, error = %e, "log sink flush failed");
            }
        }
    }
}
