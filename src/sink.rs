use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::Format;
use crate::record::Severity;

/// Error type returned by [`LogSink`] implementations.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not open log file: {0}")]
    Open(#[from] tracing_appender::rolling::InitError),

    #[error("sink is closed")]
    Closed,
}

/// Destination for formatted log lines.
///
/// The registry calls `write` on the logging thread with a line that is
/// already formatted for this sink. Implementations are expected to do
/// their own buffering; slow backends can be wrapped in
/// [`BufferedSink`](crate::buffered::BufferedSink) to move I/O onto a
/// background task.
pub trait LogSink: Send + Sync {
    /// Write one line (without trailing newline).
    ///
    /// **Parameters**
    /// - `severity`: severity of the record, for sinks that route by level
    ///   (the console sends `error` to stderr).
    /// - `line`: the record rendered in the sink's configured [`Format`].
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted.
    /// - `Err(..)` on I/O failure. The registry counts and reports the
    ///   failure; it never reaches the logging call site.
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError>;

    /// Flush any buffered lines. Default implementation is a no-op.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// The two kinds of sink the registry manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SinkKind {
    Console,
    RotatingFile,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Console => f.write_str("console"),
            SinkKind::RotatingFile => f.write_str("file"),
        }
    }
}

/// Per-sink threshold and format. Replaced, never mutated, on reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub min_severity: Severity,
    pub format: Format,
}

impl SinkConfig {
    pub fn new(kind: SinkKind, min_severity: Severity, format: Format) -> Self {
        SinkConfig { kind, min_severity, format }
    }

    /// Whether a record of `severity` passes this sink's threshold.
    pub fn accepts(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Severity; 4] = [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error];

    #[test]
    fn threshold_admits_equal_or_higher() {
        for min in ALL {
            let config = SinkConfig::new(SinkKind::Console, min, Format::Line);
            for s in ALL {
                assert_eq!(config.accepts(s), s >= min, "record {s} vs min {min}");
            }
        }
    }
}
