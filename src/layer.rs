use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::caller::CallSite;
use crate::logger::Logger;
use crate::record::{ErrorInfo, FieldValue, Payload, Severity};

/// Events from this crate are never bridged, so the logger's own
/// diagnostics cannot loop back into it.
const OWN_TARGET: &str = "stacklog";

/// `tracing_subscriber` layer that feeds `tracing` events into a
/// [`Logger`].
///
/// The event message becomes the record message, the other fields become
/// the payload (`error` values are recorded as [`ErrorInfo`]), and the
/// event's file and line are used as the caller location.
pub struct BridgeLayer {
    logger: Arc<Logger>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events handed to the logger.
    pub bridged_events: Arc<AtomicU64>,
}

impl BridgeLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        BridgeLayer {
            logger,
            total_events: Arc::new(AtomicU64::new(0)),
            bridged_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for BridgeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if meta.target() == OWN_TARGET || meta.target().starts_with("stacklog::") {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let site = CallSite::exact(meta.file(), meta.line());
        self.logger.emit_at(
            Severity::from(*meta.level()),
            message.as_deref().unwrap_or_default(),
            Payload::Fields(fields),
            &site,
        );
        self.bridged_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, FieldValue>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn plain(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), FieldValue::Plain(value));
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.plain(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.plain(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.plain(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.plain(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.plain(field, serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields
            .insert(field.name().to_string(), FieldValue::Error(ErrorInfo::from_error(value)));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.plain(field, serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
