use std::time::Instant;
use tokio::io::BufReader;

use stacklog::config::LoggerConfig;

/// Pipe control messages into stdin to change verbosity while running:
///
/// ```text
/// {"type":"update:loglevel","data":{"level":"warn","target":"console"}}
/// ```
#[tokio::main]
async fn main() {
    let config = LoggerConfig { enable_file: false, ..LoggerConfig::default() };
    let logger = match stacklog::init::init(config) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("could not initialize logging: {e}");
            return;
        }
    };

    let controller = logger.controller();
    let listener = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = controller.listen(stdin).await {
            eprintln!("control channel closed: {e}");
        }
    });

    let start = Instant::now();
    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1));
    while !listener.is_finished() {
        interval.tick().await;
        tick += 1;
        stacklog::debug("tick", serde_json::json!({ "tick": tick }));
        stacklog::info("uptime", serde_json::json!({ "secs": start.elapsed().as_secs() }));
        stacklog::warn("every tick is a warning", ());
    }
    stacklog::flush();
}
