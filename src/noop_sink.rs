use crate::record::Severity;
use crate::sink::{LogSink, SinkError};

/// A sink that simply drops all lines.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// I/O, and for tests that don't care about output.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn write(&self, _severity: Severity, _line: &str) -> Result<(), SinkError> {
        Ok(())
    }
}
