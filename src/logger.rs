use std::io;

use tracing::info;
use tracing_subscriber::{prelude::*, fmt, EnvFilter};

// Install the global subscriber.
// Logs are written to stderr, stdout is reserved for the FPS reports
pub fn init_logging() {
    let level = if cfg!(debug_assertions) { "trace" } else { "info" };

    let (filter, fallback) = match EnvFilter::try_from_default_env() {
        Ok(f) => (f, false),
        Err(_) => (EnvFilter::new(level), true),
    };

    let fmt_layer = fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();

    if fallback {
        info!("\"RUST_LOG\" variable not set, defaulting to {level}");
    }
}
