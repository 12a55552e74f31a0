//! Logging utilities for Sitewatch components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the filter: RUST_LOG wins, then the given level, then INFO.
fn filter(default_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or("info")))
}

/// Initialize tracing with sensible defaults.
///
/// Uses the RUST_LOG environment variable to control log levels, falling
/// back to `default_level` and then INFO.
pub fn init(default_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(default_level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json(default_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(filter(default_level))
        .init();
}

/// Initialize tracing from a configured format name (`json` or anything else).
pub fn init_with_format(format: Option<&str>, default_level: Option<&str>) {
    match format {
        Some(f) if f.eq_ignore_ascii_case("json") => init_json(default_level),
        _ => init(default_level),
    }
}
