//! Input validation utilities
//!
//! Command text goes on the wire verbatim, so it must not carry its own
//! line terminators.

/// Validate that command text is non-empty and cannot split into two commands
pub fn is_valid_command_text(input: &str) -> bool {
    !input.trim().is_empty() && !input.contains('\0') && !input.contains('\r') && !input.contains('\n')
}
