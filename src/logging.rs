//! Logging setup for hosts that do not install their own subscriber.
//!
//! The monitor itself only emits `tracing` events. Embedding applications
//! usually own the subscriber; this is for tools, tests and demos.
//! `RUST_LOG` overrides the default directive.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{MonitorError, MonitorResult};

/// Default filter directive.
pub const DEFAULT_DIRECTIVE: &str = "places_monitor=info";

/// Install a global fmt subscriber.
///
/// Returns `Ok(false)` if a global subscriber was already installed, which
/// makes repeated calls harmless.
///
/// # Errors
///
/// Returns `InvalidConfig` if `default_directive` does not parse.
pub fn init_logging(default_directive: &str) -> MonitorResult<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(default_directive)?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    Ok(tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok())
}

fn build_filter(directive: &str) -> MonitorResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| MonitorError::InvalidConfig {
        field: "log_directive".to_string(),
        reason: e.to_string(),
    })
}
