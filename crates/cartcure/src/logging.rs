//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Installs the global subscriber and routes `log` records into it.
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init(default_filter: &str, json: bool) {
    if tracing_log::LogTracer::init().is_err() {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = if json {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_target(true));
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(false));
        tracing::subscriber::set_global_default(subscriber)
    };

    if result.is_err() {
        log::debug!("Tracing subscriber already installed");
    }
}
