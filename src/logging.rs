//! Subscriber setup for the crate's own diagnostics.
//!
//! Server lifecycle, dropped headers and access-log sink failures are reported
//! through `tracing`. Applications that already install a subscriber can skip
//! this module entirely.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, Settings};

/// Installs a global `tracing` subscriber shaped by `settings`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(settings: &Settings) -> bool {
    let filter = EnvFilter::try_new(&settings.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .try_init(),
    };
    installed.is_ok()
}
