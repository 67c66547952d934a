use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::CanonicalRecord;

/// Timestamp layout used by both wire formats.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wire representation of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `ts :: [pid] :: level :: caller :: message :: {fields}`
    #[default]
    Line,
    /// One flat JSON object per line.
    Json,
}

/// Render `record` in the given format. Pure and deterministic.
pub fn format_record(record: &CanonicalRecord, format: Format) -> String {
    match format {
        Format::Line => format_line(record),
        Format::Json => format_json(record),
    }
}

fn format_line(record: &CanonicalRecord) -> String {
    let fields = serde_json::to_string(&record.fields).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{} :: [{}] :: {} :: {} :: {} :: {}",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.pid,
        record.severity,
        record.caller,
        record.message,
        fields
    )
}

fn format_json(record: &CanonicalRecord) -> String {
    let mut object: Map<String, Value> =
        record.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    // Record attributes are inserted last so they win over payload keys.
    object.insert(
        "timestamp".to_string(),
        Value::String(record.timestamp.format(TIMESTAMP_FORMAT).to_string()),
    );
    object.insert("level".to_string(), Value::String(record.severity.to_string()));
    object.insert("message".to_string(), Value::String(record.message.clone()));
    object.insert("filename".to_string(), Value::String(record.caller.clone()));
    object.insert("pid".to_string(), Value::from(record.pid));

    serde_json::to_string(&Value::Object(object)).unwrap_or_else(|_| "{}".to_string())
}
