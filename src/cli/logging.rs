//! Stderr tracing setup.
//!
//! The subscriber is installed before the config file is read, so config
//! loading can log. The configured level is swapped in once it is known.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter used until the config is loaded: `MEMGATE_LOG_LEVEL`, then
/// `RUST_LOG`, then `info`.
pub fn bootstrap_filter(memgate_level: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    memgate_level
        .or(rust_log)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber. Log to stderr so JSON on stdout stays clean.
pub fn init() -> FilterHandle {
    let memgate_level = std::env::var("MEMGATE_LOG_LEVEL").ok();
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter, handle) = reload::Layer::new(bootstrap_filter(
        memgate_level.as_deref(),
        rust_log.as_deref(),
    ));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

/// Apply `level` from the loaded config. An invalid level keeps the current filter.
pub fn apply_level(handle: &FilterHandle, level: &str) {
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::warn!(error = %e, "failed to apply log level");
            }
        }
        Err(e) => tracing::warn!(level, error = %e, "invalid log_level, keeping current filter"),
    }
}
