//! Runtime level control.
//!
//! A supervisor can change verbosity without a restart by sending
//! `{"type":"update:loglevel","data":{"level":"warn"}}`, optionally with
//! `"target":"file"` or `"target":"console"`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::record::Severity;
use crate::registry::{LevelTarget, SinkRegistry};

/// Payload of an `update:loglevel` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub level: Severity,
    #[serde(default)]
    pub target: LevelTarget,
}

/// Out-of-band control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ControlMessage {
    #[serde(rename = "update:loglevel")]
    UpdateLogLevel(LevelUpdate),
}

impl ControlMessage {
    pub fn update_level(level: Severity, target: LevelTarget) -> Self {
        ControlMessage::UpdateLogLevel(LevelUpdate { level, target })
    }
}

/// Error type returned when a control message cannot be decoded.
#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    #[error("malformed control message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Applies control messages to a [`SinkRegistry`].
#[derive(Clone)]
pub struct LevelController {
    registry: Arc<SinkRegistry>,
}

impl LevelController {
    pub fn new(registry: Arc<SinkRegistry>) -> Self {
        LevelController { registry }
    }

    pub fn set_level(&self, level: Severity, target: LevelTarget) {
        self.registry.set_level(level, target);
    }

    pub fn apply(&self, message: &ControlMessage) {
        match message {
            ControlMessage::UpdateLogLevel(update) => self.set_level(update.level, update.target),
        }
    }

    /// Decode and apply one JSON control message.
    pub fn apply_json(&self, raw: &str) -> Result<(), ControlError> {
        let message: ControlMessage = serde_json::from_str(raw)?;
        self.apply(&message);
        Ok(())
    }

    /// Apply every message received on `rx` until the channel closes.
    pub fn spawn(self, mut rx: mpsc::Receiver<ControlMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                tracing::debug!(?message, "control message received");
                self.apply(&message);
            }
        })
    }

    /// Apply newline-delimited JSON messages from `reader` until EOF.
    /// Malformed lines are reported and skipped.
    pub async fn listen<R>(&self, reader: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Err(e) = self.apply_json(line) {
                tracing::warn!(error = %e, "ignoring control message");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::noop_sink::NoopSink;
    use crate::registry::SinkEntry;
    use crate::sink::{SinkConfig, SinkKind};

    fn controller() -> (LevelController, Arc<SinkRegistry>) {
        let registry = Arc::new(
            SinkRegistry::new(vec![
                SinkEntry::new(SinkConfig::new(SinkKind::Console, Severity::Debug, Format::Line), Arc::new(NoopSink)),
                SinkEntry::new(SinkConfig::new(SinkKind::RotatingFile, Severity::Debug, Format::Line), Arc::new(NoopSink)),
            ])
            .unwrap(),
        );
        (LevelController::new(Arc::clone(&registry)), registry)
    }

    fn min(registry: &SinkRegistry, kind: SinkKind) -> Severity {
        registry.snapshot().config(kind).unwrap().min_severity
    }

    #[test]
    fn decodes_wire_message() {
        let message: ControlMessage =
            serde_json::from_str(r#"{"type":"update:loglevel","data":{"level":"warn"}}"#).unwrap();
        assert_eq!(message, ControlMessage::update_level(Severity::Warn, LevelTarget::Both));

        let encoded = serde_json::to_value(ControlMessage::update_level(Severity::Info, LevelTarget::File)).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({ "type": "update:loglevel", "data": { "level": "info", "target": "file" } })
        );
    }

    #[test]
    fn apply_json_updates_targeted_sink() {
        let (controller, registry) = controller();
        controller
            .apply_json(r#"{"type":"update:loglevel","data":{"level":"error","target":"file"}}"#)
            .unwrap();
        assert_eq!(min(&registry, SinkKind::RotatingFile), Severity::Error);
        assert_eq!(min(&registry, SinkKind::Console), Severity::Debug);
    }

    #[test]
    fn level_accepts_env_spellings() {
        let (controller, registry) = controller();
        controller
            .apply_json(r#"{"type":"update:loglevel","data":{"level":"WARNING"}}"#)
            .unwrap();
        assert_eq!(min(&registry, SinkKind::Console), Severity::Warn);
        assert_eq!(min(&registry, SinkKind::RotatingFile), Severity::Warn);
    }

    #[test]
    fn rejects_unknown_messages() {
        let (controller, registry) = controller();
        assert!(controller.apply_json(r#"{"type":"reboot","data":{}}"#).is_err());
        assert!(controller.apply_json(r#"{"type":"update:loglevel","data":{"level":"loud"}}"#).is_err());
        assert_eq!(registry.snapshot().generation(), 0);
    }

    #[tokio::test]
    async fn spawned_controller_applies_channel_messages() {
        let (controller, registry) = controller();
        let (tx, rx) = mpsc::channel(4);
        let handle = controller.spawn(rx);

        tx.send(ControlMessage::update_level(Severity::Warn, LevelTarget::Console)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(min(&registry, SinkKind::Console), Severity::Warn);
    }

    #[tokio::test]
    async fn listen_skips_garbage_lines() {
        let (controller, registry) = controller();
        let input: &[u8] = b"not json\n\n{\"type\":\"update:loglevel\",\"data\":{\"level\":\"info\"}}\n";

        controller.listen(input).await.unwrap();

        assert_eq!(min(&registry, SinkKind::Console), Severity::Info);
        assert_eq!(min(&registry, SinkKind::RotatingFile), Severity::Info);
        assert_eq!(registry.snapshot().generation(), 1);
    }
}
