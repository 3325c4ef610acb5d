// logger.rs – log subscriber setup

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `log` records are bridged through
/// `tracing-log`, so `RUST_LOG` controls both.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
