//! Forwards engine logs to a console pane.
//!
//! Run with:
//! ```bash
//! cargo run -p core-runtime --example console_demo
//! cargo run -p core-runtime --example console_demo -- json "core_transfer=debug"
//! ```

use bridge_traits::logging::{ConsoleLogger, LogLevel};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

#[core_async::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    // The console pane only shows warnings and above.
    let pane = Arc::new(ConsoleLogger {
        min_level: LogLevel::Warn,
    });

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_logger_sink(pane);
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("failed to initialize logging: {}", e);
        return;
    }

    info!(
        base_url = "https://photos.example.com",
        api_key = %redact_if_sensitive("api_key", "s3cr3t-key"),
        "Logged in"
    );

    let span = info_span!("upload", run_id = "demo");
    let _guard = span.enter();

    info!(files = 3, "Phase 2: Transferring");
    debug!(file = "IMG_0001.jpg", attempt = 1, "Uploading");
    warn!(file = "IMG_0002.jpg", attempt = 2, error = "502 Bad Gateway", "Retrying upload");
    info!(album = "Trip", created = true, "Phase 3: Organizing");
}
