//! Structured logging setup.
//!
//! Library code only emits `tracing` events. Binaries and tests that want
//! them printed call [`init_logging`] once at startup.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs a global fmt subscriber.
///
/// The filter comes from `RUST_LOG`; when that is unset or invalid,
/// `default_level` (for example `"info"` or `"procman=debug"`) is used.
/// Calling this more than once, or after another subscriber has been
/// installed, is harmless.
///
/// # Examples
///
/// ```
/// procman::logging::init_logging("info");
/// procman::logging::init_logging("debug"); // no-op
/// ```
pub fn init_logging(default_level: &str) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init();

        if installed.is_err() {
            tracing::debug!("global tracing subscriber already set, keeping it");
        }
    });
}
