use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::archive::{PayloadArchiver, UNAVAILABLE_REF};
use crate::caller::{CallSite, CallerResolver, TrackedResolver};
use crate::record::{
    CanonicalRecord, FieldValue, Payload, Severity, JSON_DUMP_KEY, JSON_DUMP_REF_KEY, RESERVED_KEYS,
};

/// Source of record timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Turns a facade call into a [`CanonicalRecord`].
///
/// Error fields are collapsed into `err` (and `stack` when stack capture is
/// on), `json_dump` is archived, reserved keys are dropped and a bare value
/// is kept under the key `"0"`.
#[derive(Clone)]
pub struct Normalizer {
    resolver: Arc<dyn CallerResolver>,
    archiver: Option<PayloadArchiver>,
    capture_stack: bool,
    clock: Clock,
    pid: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(Arc::new(TrackedResolver::default()))
    }
}

impl Normalizer {
    pub fn new(resolver: Arc<dyn CallerResolver>) -> Self {
        Normalizer {
            resolver,
            archiver: None,
            capture_stack: true,
            clock: Arc::new(Local::now),
            pid: std::process::id(),
        }
    }

    /// Without an archiver every `json_dump` resolves to `"NA"`.
    pub fn with_archiver(mut self, archiver: PayloadArchiver) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn with_stack_capture(mut self, enabled: bool) -> Self {
        self.capture_stack = enabled;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Build the record. Never panics: if anything inside fails the record
    /// degrades to the bare message with no caller and no fields.
    pub fn normalize(
        &self,
        severity: Severity,
        message: &str,
        payload: Payload,
        site: &CallSite,
    ) -> CanonicalRecord {
        let built = catch_unwind(AssertUnwindSafe(move || {
            let caller = self.resolver.resolve(site);
            CanonicalRecord {
                timestamp: (self.clock)(),
                severity,
                message: message.to_string(),
                caller,
                pid: self.pid,
                fields: self.fields(payload),
            }
        }));

        built.unwrap_or_else(|_| CanonicalRecord {
            timestamp: Local::now(),
            severity,
            message: message.to_string(),
            caller: String::new(),
            pid: self.pid,
            fields: BTreeMap::new(),
        })
    }

    fn fields(&self, payload: Payload) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        let entries = match payload {
            Payload::Absent => return out,
            Payload::Value(value) => {
                out.insert("0".to_string(), value);
                return out;
            }
            Payload::Fields(entries) => entries,
        };

        for (key, value) in entries {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if key == JSON_DUMP_KEY {
                let data = match value {
                    FieldValue::Plain(Value::Null) => continue,
                    FieldValue::Plain(data) => data,
                    FieldValue::Error(info) => serde_json::to_value(&info).unwrap_or_default(),
                };
                out.insert(JSON_DUMP_REF_KEY.to_string(), Value::String(self.archive(&data)));
                continue;
            }
            match value {
                FieldValue::Error(info) if info.looks_like_error() => {
                    out.insert("err".to_string(), Value::String(info.message));
                    if self.capture_stack {
                        out.insert("stack".to_string(), Value::String(info.stack));
                    }
                }
                FieldValue::Error(info) => {
                    out.insert(key, serde_json::to_value(&info).unwrap_or_default());
                }
                FieldValue::Plain(value) => {
                    out.insert(key, value);
                }
            }
        }
        out
    }

    fn archive(&self, data: &Value) -> String {
        match &self.archiver {
            Some(archiver) => archiver.archive(data),
            None => UNAVAILABLE_REF.to_string(),
        }
    }
}
