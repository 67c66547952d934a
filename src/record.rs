use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Keys carried as first-class record attributes. They never appear in
/// [`CanonicalRecord::fields`].
pub const RESERVED_KEYS: [&str; 4] = ["timestamp", "level", "message", "filename"];

/// Payload key whose value is offloaded to the archive store.
pub const JSON_DUMP_KEY: &str = "json_dump";

/// Field that receives the archive reference in place of `json_dump`.
pub const JSON_DUMP_REF_KEY: &str = "json_dump_ref";

/// Ordered log severity. `Debug < Info < Warn < Error`.
///
/// Deserializes through [`FromStr`], so control messages accept the same
/// spellings as the environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a severity name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level: {0:?}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = ParseSeverityError;

    fn try_from(s: String) -> Result<Self, ParseSeverityError> {
        s.parse()
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

/// Message and stack text extracted from an error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub stack: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        ErrorInfo { message: message.into(), stack: stack.into() }
    }

    /// Build from any error. The stack text is the error's display text
    /// followed by one `caused by:` line per source in the chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        let mut stack = message.clone();
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        ErrorInfo { message, stack }
    }

    /// True when both the message and the stack text are non-empty.
    pub fn looks_like_error(&self) -> bool {
        !self.message.is_empty() && !self.stack.is_empty()
    }
}

/// A single payload field: either plain data or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Plain(serde_json::Value),
    Error(ErrorInfo),
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Plain(value)
    }
}

impl From<ErrorInfo> for FieldValue {
    fn from(info: ErrorInfo) -> Self {
        FieldValue::Error(info)
    }
}

/// Second argument of every facade call.
///
/// ```
/// use stacklog::record::Payload;
/// use serde_json::json;
///
/// let p: Payload = json!({ "userId": 42 }).into();
/// let q = Payload::new().with("userId", 42).with_dump(json!({ "rows": [1, 2, 3] }));
/// let none: Payload = ().into();
/// # let _ = (p, q, none);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Absent,
    /// A non-object value, logged under the key `"0"`.
    Value(serde_json::Value),
    Fields(BTreeMap<String, FieldValue>),
}

impl Payload {
    /// Empty structured payload, ready for the `with*` builders.
    pub fn new() -> Self {
        Payload::Fields(BTreeMap::new())
    }

    pub fn with<T: Serialize>(self, key: impl Into<String>, value: T) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| serde_json::Value::String(format!("<unserializable: {e}>")));
        self.insert(key.into(), FieldValue::Plain(value))
    }

    pub fn with_error(self, key: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        self.insert(key.into(), FieldValue::Error(ErrorInfo::from_error(err)))
    }

    pub fn with_error_info(self, key: impl Into<String>, info: ErrorInfo) -> Self {
        self.insert(key.into(), FieldValue::Error(info))
    }

    /// Attach a large payload to be archived instead of logged inline.
    pub fn with_dump<T: Serialize>(self, value: T) -> Self {
        self.with(JSON_DUMP_KEY, value)
    }

    fn insert(self, key: String, value: FieldValue) -> Self {
        let mut fields = match self {
            Payload::Fields(fields) => fields,
            Payload::Absent => BTreeMap::new(),
            Payload::Value(v) => {
                let mut fields = BTreeMap::new();
                fields.insert("0".to_string(), FieldValue::Plain(v));
                fields
            }
        };
        fields.insert(key, value);
        Payload::Fields(fields)
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Absent
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                Payload::Fields(map.into_iter().map(|(k, v)| (k, FieldValue::Plain(v))).collect())
            }
            other => Payload::Value(other),
        }
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Payload::Absent)
    }
}

impl From<BTreeMap<String, FieldValue>> for Payload {
    fn from(fields: BTreeMap<String, FieldValue>) -> Self {
        Payload::Fields(fields)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Value(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Value(serde_json::Value::String(value))
    }
}

/// Normalized, sink-agnostic representation of one log event.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
    /// `path:line` of the issuing call, or empty.
    pub caller: String,
    pub pid: u32,
    pub fields: BTreeMap<String, serde_json::Value>,
}
