//! `tracing` logger setup for the app core.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Initialize the global logger with a `RUST_LOG`-style filter string.
///
/// An unparseable filter falls back to INFO rather than erroring; logging is
/// not worth failing app startup over.
pub fn init(rust_log: &str) {
    // _DONT_ panic if there is already a logger set; the UI layer hot
    // reloads and re-runs init.
    let _ = subscriber(rust_log).try_init();
}

/// Quickly init logging in tests. Set `RUST_LOG` to see test output.
pub fn init_for_testing() {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let _ = subscriber(&rust_log).try_init();
}

fn subscriber(rust_log: &str) -> impl SubscriberInitExt {
    let filter = Targets::from_str(rust_log)
        .ok()
        .unwrap_or_else(|| Targets::new().with_default(Level::INFO));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(filter);

    tracing_subscriber::registry().with(fmt_layer)
}
