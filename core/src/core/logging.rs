//! Logging setup
//!
//! Host processes embedding this crate call [`init`] once at startup.
//! The filter comes from TRACEDECK_LOG, then RUST_LOG, then a default.

const ENV_LOG: &str = "TRACEDECK_LOG";
const DEFAULT_FILTER: &str = "info,tracedeck_core=info";

/// Initialize the global tracing subscriber. Panics if a subscriber is
/// already installed, so call it exactly once.
pub fn init() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_env_filter(filter)
        .init();
}
