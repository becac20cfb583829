use std::io::IsTerminal;

use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize JSON structured logging with environment-based filtering.
/// When `GATEKEEPER_LOG_DIR` is set, logs roll daily into that directory
/// instead of going to stdout.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(dir) = std::env::var("GATEKEEPER_LOG_DIR") {
        let appender = rolling::daily(dir, "gatekeeper.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        fmt().with_env_filter(filter).json().flatten_event(true).with_writer(writer).init();

        // Keep the guard alive for the entire lifetime of the program.
        std::mem::forget(guard);
    } else if std::io::stdout().is_terminal() {
        fmt().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).json().flatten_event(true).init();
    }
}
