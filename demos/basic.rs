use serde_json::json;
use stacklog::{ErrorInfo, Payload};

#[derive(Debug, thiserror::Error)]
#[error("payment gateway timed out")]
struct GatewayTimeout;

fn main() {
    // Reads LOG_DIR, JSON_DUMP_DIR, LOG_LEVEL, CONSOLE_LOG_LEVEL, ...
    if let Err(e) = stacklog::init::init_from_env() {
        eprintln!("falling back to console logging: {e}");
    }
    stacklog::init::install_panic_hook();

    stacklog::info("service started", json!({ "version": env!("CARGO_PKG_VERSION") }));
    stacklog::debug("cache size", json!(128));
    stacklog::warn("slow query", Payload::new().with("ms", 1830).with("table", "orders"));
    stacklog::error("charge failed", Payload::new().with("orderId", "A-17").with_error("cause", &GatewayTimeout));
    stacklog::error(
        "manual error info",
        Payload::new().with_error_info("e", ErrorInfo::new("bad state", "bad state\n    at checkout")),
    );
    stacklog::info(
        "nightly export",
        Payload::new().with("rows", 3).with_dump(json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }])),
    );

    stacklog::flush();

    // Logged at error with this file and line before the default hook runs.
    let _ = std::thread::spawn(|| panic!("worker gave up")).join();
}
