//! Utility functions
//!
//! Logging setup and command text validation.

pub mod logging;
pub mod validation;
