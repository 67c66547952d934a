use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::record::Severity;
use crate::sink::{LogSink, SinkError};

/// Attempts per line before it is given up.
const MAX_ATTEMPTS: u32 = 3;

enum Command {
    Line(Severity, String),
    Flush(Option<oneshot::Sender<()>>),
}

/// [`LogSink`] wrapper that hands lines to a background Tokio task via a
/// bounded channel, so slow I/O never runs on the logging thread.
///
/// Lines are written in batches of `batch_size` or every `flush_interval`,
/// whichever comes first. When the channel is full new lines are dropped
/// and counted; logging never waits for the sink.
pub struct BufferedSink {
    sender: mpsc::Sender<Command>,
    /// Lines offered to the sink.
    pub total_lines: Arc<AtomicU64>,
    /// Lines accepted by the inner sink.
    pub written_lines: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_lines: Arc<AtomicU64>,
    /// Given up after repeated inner write failures.
    pub failed_lines: Arc<AtomicU64>,
}

impl BufferedSink {
    /// Wrap `inner` and spawn the background writer task. Must be called
    /// inside a Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn new(
        inner: Arc<dyn LogSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<Command>(buffer);

        let total_lines = Arc::new(AtomicU64::new(0));
        let written_lines = Arc::new(AtomicU64::new(0));
        let dropped_lines = Arc::new(AtomicU64::new(0));
        let failed_lines = Arc::new(AtomicU64::new(0));

        let written_bg = Arc::clone(&written_lines);
        let failed_bg = Arc::clone(&failed_lines);

        let handle = tokio::spawn(async move {
            let mut batch: Vec<(Severity, String)> = Vec::with_capacity(batch_size);
            let counters = (&*written_bg, &*failed_bg);

            loop {
                tokio::select! {
                    command = rx.recv() => match command {
                        Some(Command::Line(severity, line)) => {
                            batch.push((severity, line));
                            if batch.len() >= batch_size {
                                write_batch(&*inner, &mut batch, counters).await;
                            }
                        }
                        Some(Command::Flush(ack)) => {
                            write_batch(&*inner, &mut batch, counters).await;
                            if let Err(e) = inner.flush() {
                                tracing::warn!(error = %e, "buffered sink flush failed");
                            }
                            if let Some(ack) = ack {
                                let _ = ack.send(());
                            }
                        }
                        None => {
                            write_batch(&*inner, &mut batch, counters).await;
                            let _ = inner.flush();
                            break;
                        }
                    },
                    _ = sleep(flush_interval) => {
                        if !batch.is_empty() {
                            write_batch(&*inner, &mut batch, counters).await;
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                total_lines,
                written_lines,
                dropped_lines,
                failed_lines,
            },
            handle,
        )
    }

    /// Wait until every line queued before this call has been written and
    /// the inner sink flushed.
    pub async fn drain(&self) -> Result<(), SinkError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Flush(Some(tx)))
            .await
            .map_err(|_| SinkError::Closed)?;
        rx.await.map_err(|_| SinkError::Closed)
    }
}

async fn write_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<(Severity, String)>,
    (written, failed): (&AtomicU64, &AtomicU64),
) {
    for (severity, line) in batch.drain(..) {
        let mut backoff = Duration::from_millis(50);
        let mut attempt = 1;
        loop {
            match sink.write(severity, &line) {
                Ok(()) => {
                    written.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(e) if attempt >= MAX_ATTEMPTS => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, attempts = attempt, "dropping log line after repeated sink failures");
                    break;
                }
                Err(_) => {
                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_secs(1));
                    attempt += 1;
                }
            }
        }
    }
}

impl LogSink for BufferedSink {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        self.total_lines.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(Command::Line(severity, line.to_string())) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_lines.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }

    /// Request a flush without waiting for it; see [`BufferedSink::drain`].
    fn flush(&self) -> Result<(), SinkError> {
        match self.sender.try_send(Command::Flush(None)) {
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
            _ => Ok(()),
        }
    }
}
