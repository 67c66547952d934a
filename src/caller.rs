//! Caller location resolution.
//!
//! The facade captures its call site through `#[track_caller]`; the
//! resolver turns that (or a walked stack frame) into a short `path:line`
//! string and drops frames that belong to dependencies, the standard
//! library or this crate.

use once_cell::sync::Lazy;
use regex::Regex;
use std::backtrace::Backtrace;
use std::panic::Location;

/// Frames from [`BacktraceResolver::resolve`] up to the code that called a
/// facade function: `resolve`, the normalizer closure, `Normalizer::normalize`,
/// `Logger::emit_at`, `Logger::emit`, the facade function, caller.
/// Runtime frames (`std::`, `core::`, `alloc::`) are not counted.
/// Re-derive this if the wrapper layering in `logger.rs` changes.
pub const FACADE_DEPTH: usize = 6;

/// Deployment folders are named after their build time.
static BUILD_FOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}-[0-9]{2}-[0-9]{2}-[0-9]{2}").expect("valid regex")
});

/// Where a log call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallSite<'a> {
    /// Frames below the resolver to walk to; `None` when `file`/`line`
    /// are exact (event metadata, panic location) and no stack walk should
    /// happen.
    pub depth: Option<usize>,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
}

impl<'a> CallSite<'a> {
    /// Site captured by a `#[track_caller]` facade method.
    pub fn tracked(location: &'a Location<'_>, depth: usize) -> Self {
        CallSite {
            depth: Some(depth),
            file: Some(location.file()),
            line: Some(location.line()),
        }
    }

    /// Site taken verbatim from event metadata or a panic location.
    pub fn exact(file: Option<&'a str>, line: Option<u32>) -> Self {
        CallSite { depth: None, file, line }
    }
}

/// Resolves a [`CallSite`] into `path:line`, or an empty string.
pub trait CallerResolver: Send + Sync {
    fn resolve(&self, site: &CallSite) -> String;
}

/// Filtering and shortening rules shared by the resolvers.
#[derive(Debug, Clone)]
pub struct PathRules {
    /// Substrings marking dependency, runtime or library-internal paths.
    pub internal_markers: Vec<String>,
    /// Directory name after which project paths are cut.
    pub project_root: Option<String>,
    /// Prefer a `YYYY-MM-DD-HH-MM-SS` build folder as the cut point.
    pub detect_build_folder: bool,
}

impl Default for PathRules {
    fn default() -> Self {
        PathRules {
            internal_markers: vec![
                "/.cargo/registry/".to_string(),
                "/.cargo/git/".to_string(),
                "/rustc/".to_string(),
                "stacklog/src/".to_string(),
            ],
            project_root: Some("app".to_string()),
            detect_build_folder: true,
        }
    }
}

impl PathRules {
    pub fn is_internal(&self, path: &str) -> bool {
        self.internal_markers.iter().any(|m| path.contains(m.as_str()))
    }

    /// Build `path:line` and shorten it, or return `""` for internal or
    /// missing locations.
    pub fn apply(&self, file: &str, line: Option<u32>) -> String {
        let file = file.strip_prefix("./").unwrap_or(file);
        if file.is_empty() {
            return String::new();
        }
        let raw = match line {
            Some(line) => format!("{file}:{line}"),
            None => file.to_string(),
        };
        if self.is_internal(&raw) {
            return String::new();
        }

        let token = if self.detect_build_folder {
            BUILD_FOLDER.find(&raw).map(|m| m.as_str().to_string())
        } else {
            None
        };
        match token.or_else(|| self.project_root.clone()) {
            Some(token) => {
                let separator = format!("/{token}/");
                raw.rsplit(separator.as_str()).next().unwrap_or(&raw).to_string()
            }
            None => raw,
        }
    }
}

/// Uses the location captured at the call site. Zero-cost apart from
/// the path rules.
#[derive(Debug, Clone, Default)]
pub struct TrackedResolver {
    rules: PathRules,
}

impl TrackedResolver {
    pub fn new(rules: PathRules) -> Self {
        TrackedResolver { rules }
    }
}

impl CallerResolver for TrackedResolver {
    fn resolve(&self, site: &CallSite) -> String {
        match site.file {
            Some(file) => self.rules.apply(file, site.line),
            None => String::new(),
        }
    }
}

/// Always resolves to an empty location.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledResolver;

impl CallerResolver for DisabledResolver {
    fn resolve(&self, _site: &CallSite) -> String {
        String::new()
    }
}

/// One parsed frame of a rendered backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub symbol: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// Walks the live call stack on every call. Needs debug info to produce
/// locations; falls back to the tracked site when the frame is missing.
#[derive(Debug, Clone, Default)]
pub struct BacktraceResolver {
    rules: PathRules,
}

impl BacktraceResolver {
    pub fn new(rules: PathRules) -> Self {
        BacktraceResolver { rules }
    }

    fn frame_at(&self, depth: usize) -> Option<Frame> {
        let rendered = Backtrace::force_capture().to_string();
        select_frame(parse_frames(&rendered), depth)
    }
}

impl CallerResolver for BacktraceResolver {
    fn resolve(&self, site: &CallSite) -> String {
        if let Some(depth) = site.depth {
            if let Some(frame) = self.frame_at(depth) {
                if frame.symbol.trim_start_matches('<').starts_with("stacklog::") {
                    return String::new();
                }
                if let Some(file) = frame.file.as_deref() {
                    return self.rules.apply(file, frame.line);
                }
            }
        }
        match site.file {
            Some(file) => self.rules.apply(file, site.line),
            None => String::new(),
        }
    }
}

/// Parse the text rendering of a `std::backtrace::Backtrace`.
///
/// Frames look like `  3: some::symbol` optionally followed by a line
/// `at /path/to/file.rs:12:5`.
pub fn parse_frames(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();
    for line in rendered.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                if frame.file.is_none() {
                    let (file, line_no) = split_location(location);
                    frame.file = Some(file);
                    frame.line = line_no;
                }
            }
            continue;
        }
        if let Some((index, symbol)) = line.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(Frame { symbol: symbol.to_string(), file: None, line: None });
            }
        }
    }
    frames
}

fn split_location(location: &str) -> (String, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let col = parts.next();
    let line = parts.next();
    let path = parts.next();
    match (path, line, col) {
        (Some(path), Some(line), Some(_)) => (path.to_string(), line.parse().ok()),
        _ => (location.to_string(), None),
    }
}

fn is_runtime_frame(symbol: &str) -> bool {
    ["std::", "core::", "alloc::", "<std::", "<core::", "<alloc::", "__rust"]
        .iter()
        .any(|p| symbol.starts_with(p))
}

/// Pick the frame `depth` positions below the outermost resolver frame,
/// skipping runtime frames.
fn select_frame(frames: Vec<Frame>, depth: usize) -> Option<Frame> {
    let anchor = frames
        .iter()
        .rposition(|f| f.symbol.contains("BacktraceResolver"))?;
    frames
        .into_iter()
        .skip(anchor)
        .filter(|f| !is_runtime_frame(&f.symbol))
        .nth(depth)
}
