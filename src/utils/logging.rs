//! Logging utilities
//!
//! Provides logging setup for the client binary.

use env_logger::Env;

/// Setup logging; `RUST_LOG` overrides the default `info` filter
pub fn setup_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
