//! Diagnostic tracing to standard error.
//!
//! Filtering follows `RUST_LOG` and defaults to `warn`, so the fallback
//! warning for an unisolated sandbox is visible out of the box.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Installs a compact stderr subscriber.
///
/// Returns `false` when a global subscriber was already installed, which
/// leaves the existing one in place. Calling this repeatedly is harmless.
#[must_use]
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .is_ok()
}
