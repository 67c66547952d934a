//! Date- and size-rotated log files.
//!
//! Files are named `<prefix>.<date>` (date from `date_pattern`, by default
//! `YYYY-MM-DD`). When a file reaches `max_size` the sink continues in
//! `<prefix>.<date>.1`, `<prefix>.<date>.2`, ... Every time a new file is
//! opened old files are pruned according to [`Retention`].
//!
//! Each file is opened through a non-rotating
//! [`RollingFileAppender`]; the date and size decisions are made here,
//! against the sink's own clock, so that file names follow local time.

use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::config::ConfigError;
use crate::normalize::Clock;
use crate::record::Severity;
use crate::sink::{LogSink, SinkError};

/// How many rotated files to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Delete files last modified more than this many days ago.
    Days(u32),
    /// Keep at most this many files, newest first.
    Count(usize),
}

impl FromStr for Retention {
    type Err = ConfigError;

    /// `"15d"` keeps fifteen days, `"5"` keeps five files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ConfigError::InvalidRetention(s.to_string());
        match s.strip_suffix(['d', 'D']) {
            Some(days) => days.parse().map(Retention::Days).map_err(|_| invalid()),
            None => s.parse().map(Retention::Count).map_err(|_| invalid()),
        }
    }
}

/// Parse a size like `500m`, `10k`, `1g` or a plain byte count.
pub fn parse_size(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidSize(s.to_string());
    let lower = s.to_ascii_lowercase();
    let (digits, multiplier) = match lower.chars().last() {
        Some('k') => (&lower[..lower.len() - 1], 1024),
        Some('m') => (&lower[..lower.len() - 1], 1024 * 1024),
        Some('g') => (&lower[..lower.len() - 1], 1024 * 1024 * 1024),
        _ => (lower.as_str(), 1),
    };
    let n: u64 = digits.parse().map_err(|_| invalid())?;
    n.checked_mul(multiplier).ok_or_else(invalid)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Roll over to a numbered file once this many bytes are written.
    pub max_size: Option<u64>,
    pub retention: Option<Retention>,
    /// `chrono` format string for the date part of the file name.
    pub date_pattern: String,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy {
            max_size: Some(500 * 1024 * 1024),
            retention: Some(Retention::Days(15)),
            date_pattern: "%Y-%m-%d".to_string(),
        }
    }
}

struct OpenFile {
    date: String,
    index: u32,
    written: u64,
    path: PathBuf,
    writer: RollingFileAppender,
}

/// File sink with date and size rotation.
pub struct RotatingFileSink {
    dir: PathBuf,
    prefix: String,
    policy: RotationPolicy,
    clock: Clock,
    current: Mutex<Option<OpenFile>>,
}

impl RotatingFileSink {
    /// Create the sink. No file is opened until the first write; the
    /// directory is created then if it is missing.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, policy: RotationPolicy) -> Self {
        RotatingFileSink {
            dir: dir.into(),
            prefix: prefix.into(),
            policy,
            clock: Arc::new(Local::now),
            current: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file currently written to, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.as_ref().map(|f| f.path.clone())
    }

    fn file_name(&self, date: &str, index: u32) -> String {
        if index == 0 {
            format!("{}.{}", self.prefix, date)
        } else {
            format!("{}.{}.{}", self.prefix, date, index)
        }
    }

    /// Open the first file for `date` starting at `index` that still has
    /// room for `incoming` bytes.
    fn open(&self, date: &str, mut index: u32, incoming: u64) -> Result<OpenFile, SinkError> {
        loop {
            let path = self.dir.join(self.file_name(date, index));
            let written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let full = match self.policy.max_size {
                Some(max) => written > 0 && written + incoming > max,
                None => false,
            };
            if full {
                index += 1;
                continue;
            }
            let writer = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(self.file_name(date, index))
                .build(&self.dir)?;
            return Ok(OpenFile {
                date: date.to_string(),
                index,
                written,
                path,
                writer,
            });
        }
    }

    fn prune(&self, keep: &Path) {
        let Some(retention) = self.policy.retention else {
            return;
        };
        if let Err(e) = self.try_prune(retention, keep) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "could not prune rotated log files");
        }
    }

    fn try_prune(&self, retention: Retention, keep: &Path) -> std::io::Result<()> {
        let marker = format!("{}.", self.prefix);
        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_ours = entry.file_name().to_string_lossy().starts_with(&marker);
            if !is_ours || path == keep || !entry.file_type()?.is_file() {
                continue;
            }
            files.push((entry.metadata()?.modified()?, path));
        }

        let doomed: Vec<PathBuf> = match retention {
            Retention::Days(days) => {
                let max_age = Duration::from_secs(u64::from(days) * 24 * 60 * 60);
                let now = SystemTime::now();
                files
                    .into_iter()
                    .filter(|(modified, _)| now.duration_since(*modified).map_or(false, |age| age > max_age))
                    .map(|(_, path)| path)
                    .collect()
            }
            Retention::Count(count) => {
                files.sort_by(|a, b| b.0.cmp(&a.0));
                // The current file counts towards the limit.
                files.into_iter().skip(count.saturating_sub(1)).map(|(_, path)| path).collect()
            }
        };
        for path in doomed {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl LogSink for RotatingFileSink {
    fn write(&self, _severity: Severity, line: &str) -> Result<(), SinkError> {
        let incoming = line.len() as u64 + 1;
        let date = (self.clock)().format(&self.policy.date_pattern).to_string();
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let reopen = match current.as_ref() {
            None => Some(0),
            Some(open) if open.date != date => Some(0),
            Some(open) => match self.policy.max_size {
                Some(max) if open.written > 0 && open.written + incoming > max => Some(open.index + 1),
                _ => None,
            },
        };
        if let Some(index) = reopen {
            if let Some(mut old) = current.take() {
                old.writer.flush()?;
            }
            let opened = self.open(&date, index, incoming)?;
            self.prune(&opened.path);
            *current = Some(opened);
        }

        let Some(open) = current.as_mut() else {
            return Err(SinkError::Closed);
        };
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        open.writer.write_all(buf.as_bytes())?;
        open.written += incoming;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(open) = current.as_mut() {
            open.writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use std::fs::File;

    fn clock_at(day: u32) -> Clock {
        Arc::new(move || Local.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap())
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn parses_sizes_and_retention() {
        assert_eq!(parse_size("500m").unwrap(), 500 * 1024 * 1024);
        assert_eq!(parse_size("10K").unwrap(), 10 * 1024);
        assert_eq!(parse_size("2048").unwrap(), 2048);
        assert!(parse_size("lots").is_err());
        assert_eq!("15d".parse::<Retention>().unwrap(), Retention::Days(15));
        assert_eq!("5".parse::<Retention>().unwrap(), Retention::Count(5));
        assert!("d".parse::<Retention>().is_err());
    }

    #[test]
    fn writes_to_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RotatingFileSink::new(dir.path(), "api", RotationPolicy::default()).with_clock(clock_at(1));

        sink.write(Severity::Info, "first").unwrap();
        sink.write(Severity::Info, "second").unwrap();
        sink.flush().unwrap();

        assert_eq!(names(dir.path()), vec!["api.2024-01-01"]);
        assert_eq!(fs::read_to_string(dir.path().join("api.2024-01-01")).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn creates_missing_directory_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("logs");
        let sink = RotatingFileSink::new(&nested, "api", RotationPolicy::default()).with_clock(clock_at(1));

        sink.write(Severity::Info, "hello").unwrap();
        assert_eq!(fs::read_to_string(nested.join("api.2024-01-01")).unwrap(), "hello\n");
        assert_eq!(sink.current_path(), Some(nested.join("api.2024-01-01")));
    }

    #[test]
    fn rolls_over_on_size() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy { max_size: Some(12), retention: None, ..RotationPolicy::default() };
        let sink = RotatingFileSink::new(dir.path(), "api", policy).with_clock(clock_at(1));

        for line in ["aaaaaaaaa", "bbbbbbbbb", "ccccccccc"] {
            sink.write(Severity::Info, line).unwrap();
        }
        sink.flush().unwrap();

        assert_eq!(names(dir.path()), vec!["api.2024-01-01", "api.2024-01-01.1", "api.2024-01-01.2"]);
        assert_eq!(fs::read_to_string(dir.path().join("api.2024-01-01.1")).unwrap(), "bbbbbbbbb\n");
    }

    #[test]
    fn rolls_over_on_date_change() {
        let dir = tempfile::tempdir().unwrap();
        let now: Arc<Mutex<DateTime<Local>>> =
            Arc::new(Mutex::new(Local.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap()));
        let clock_now = Arc::clone(&now);
        let sink = RotatingFileSink::new(dir.path(), "api", RotationPolicy::default())
            .with_clock(Arc::new(move || *clock_now.lock().unwrap()));

        sink.write(Severity::Info, "late").unwrap();
        *now.lock().unwrap() = Local.with_ymd_and_hms(2024, 1, 2, 0, 0, 1).unwrap();
        sink.write(Severity::Info, "early").unwrap();
        sink.flush().unwrap();

        assert_eq!(names(dir.path()), vec!["api.2024-01-01", "api.2024-01-02"]);
        assert_eq!(sink.current_path(), Some(dir.path().join("api.2024-01-02")));
    }

    #[test]
    fn resumes_existing_file_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("api.2024-01-01"), "before\n").unwrap();
        let sink = RotatingFileSink::new(dir.path(), "api", RotationPolicy::default()).with_clock(clock_at(1));

        sink.write(Severity::Info, "after").unwrap();
        sink.flush().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("api.2024-01-01")).unwrap(), "before\nafter\n");
    }

    #[test]
    fn count_retention_prunes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=3 {
            let path = dir.path().join(format!("api.2024-01-0{day}"));
            fs::write(&path, "old\n").unwrap();
            let modified = SystemTime::now() - Duration::from_secs(3600 * (10 - day as u64));
            File::options().write(true).open(&path).unwrap().set_modified(modified).unwrap();
        }
        fs::write(dir.path().join("unrelated.log"), "keep\n").unwrap();

        let policy = RotationPolicy { retention: Some(Retention::Count(2)), ..RotationPolicy::default() };
        let sink = RotatingFileSink::new(dir.path(), "api", policy).with_clock(clock_at(4));
        sink.write(Severity::Info, "new").unwrap();

        assert_eq!(names(dir.path()), vec!["api.2024-01-03", "api.2024-01-04", "unrelated.log"]);
    }

    #[test]
    fn day_retention_prunes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("api.2023-12-01");
        fs::write(&stale, "old\n").unwrap();
        let twenty_days = Duration::from_secs(20 * 24 * 3600);
        File::options().write(true).open(&stale).unwrap().set_modified(SystemTime::now() - twenty_days).unwrap();
        fs::write(dir.path().join("api.2023-12-30"), "recent\n").unwrap();

        let sink = RotatingFileSink::new(dir.path(), "api", RotationPolicy::default()).with_clock(clock_at(1));
        sink.write(Severity::Info, "new").unwrap();

        assert_eq!(names(dir.path()), vec!["api.2023-12-30", "api.2024-01-01"]);
    }
}
