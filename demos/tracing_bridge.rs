use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{error, info};

use stacklog::buffered::BufferedSink;
use stacklog::format::Format;
use stacklog::normalize::Normalizer;
use stacklog::registry::{SinkEntry, SinkRegistry};
use stacklog::rotating::{RotatingFileSink, RotationPolicy};
use stacklog::sink::{LogSink, SinkConfig, SinkKind};
use stacklog::{init, Logger, Severity};

/// `tracing` events and facade calls share one pipeline; file I/O runs on
/// a background task.
#[tokio::main]
async fn main() {
    let dir = std::env::temp_dir().join("stacklog-demo");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("cannot create {}: {e}", dir.display());
        return;
    }

    let file: Arc<dyn LogSink> = Arc::new(RotatingFileSink::new(&dir, "bridge", RotationPolicy::default()));
    let (buffered, _writer) = BufferedSink::new(file, 50_000, 1_000, Duration::from_millis(200));
    let buffered = Arc::new(buffered);

    let registry = SinkRegistry::single(SinkEntry::new(
        SinkConfig::new(SinkKind::RotatingFile, Severity::Debug, Format::Json),
        buffered.clone(),
    ));
    let logger = Logger::new(Normalizer::default(), Arc::new(registry));
    let logger = match init::init_with(logger) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let subscriber = tracing_subscriber::layer::SubscriberExt::with(
        tracing_subscriber::Registry::default(),
        stacklog::layer::BridgeLayer::new(Arc::clone(&logger)),
    );
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{e}");
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();
    for i in 0..n {
        if i % 2 == 0 {
            info!(iteration = i, "bridged tracing event");
        } else {
            stacklog::info("facade call", serde_json::json!({ "iteration": i }));
        }
    }
    error!(db = "orders", "simulated error sent through the bridge");

    let elapsed = start.elapsed();
    if buffered.drain().await.is_err() {
        eprintln!("writer task stopped early");
    }
    println!(
        "sent {} records in {:?} (~{:.0} rec/s), dropped {}, log dir {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        buffered.dropped_lines.load(std::sync::atomic::Ordering::Relaxed),
        dir.display()
    );
}
