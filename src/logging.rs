//! Logging utilities for cellscope.
//!
//! Provides helpers for initializing tracing subscribers. Without the
//! `logging` feature every helper is a no-op, so callers never need to
//! gate their calls.

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with default settings.
///
/// # Environment Variables
/// - `RUST_LOG` - Log level filter (default: "info")
#[cfg(feature = "logging")]
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific level.
///
/// Only the first initialization in a process takes effect.
///
/// # Arguments
/// * `level` - Log level (trace, debug, info, warn, error)
///
/// # Example
/// ```rust
/// cellscope::logging::init_with_level("debug");
/// ```
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}

/// Initialize logging for tests. Output goes through the test harness
/// capture.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("cellscope=debug"))
        .with_test_writer()
        .try_init();
}

/// Initialize logging with default settings (no-op without the `logging`
/// feature).
#[cfg(not(feature = "logging"))]
pub fn init() {}

/// Initialize logging with a specific level (no-op without the `logging`
/// feature).
///
/// # Example
/// ```rust
/// cellscope::logging::init_with_level("debug");
/// ```
#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

/// Initialize logging for tests (no-op without the `logging` feature).
#[cfg(not(feature = "logging"))]
pub fn init_test() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        init_test();
        init_test();
        init_with_level("warn");
        init();
        tracing::debug!("logging initialized");
    }
}
