use colored::{ColoredString, Colorize};
use std::io::{self, Write};
use std::sync::Mutex;

use crate::record::Severity;
use crate::sink::{LogSink, SinkError};

/// Writes lines to stdout, and `error` lines to stderr.
///
/// With colour enabled each line is tinted by severity. `colored` still
/// drops the escapes when the terminal or `NO_COLOR` says so.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    stderr_from: Severity,
    color: bool,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        ConsoleSink::new()
    }
}

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Console sink over arbitrary writers, mainly for capturing output.
    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        ConsoleSink {
            out: Mutex::new(out),
            err: Mutex::new(err),
            stderr_from: Severity::Error,
            color: false,
        }
    }

    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Lowest severity routed to the error stream.
    pub fn stderr_from(mut self, severity: Severity) -> Self {
        self.stderr_from = severity;
        self
    }

    fn stream(&self, severity: Severity) -> &Mutex<Box<dyn Write + Send>> {
        if severity >= self.stderr_from {
            &self.err
        } else {
            &self.out
        }
    }
}

impl LogSink for ConsoleSink {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        let mut stream = self.stream(severity).lock().unwrap_or_else(|e| e.into_inner());
        if self.color {
            writeln!(stream, "{}", paint(severity, line))?;
        } else {
            writeln!(stream, "{line}")?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        for stream in [&self.out, &self.err] {
            stream.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        }
        Ok(())
    }
}

fn paint(severity: Severity, line: &str) -> ColoredString {
    match severity {
        Severity::Debug => line.blue(),
        Severity::Info => line.green(),
        Severity::Warn => line.yellow(),
        Severity::Error => line.red(),
    }
}
