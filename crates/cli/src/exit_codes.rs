//! CLI Exit Code Registry
//!
//! Single source of truth for `mflow` exit codes. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args)               |
//! | 60-69   | flow       | Config and input failures                |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above

use mineflow::FlowError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments. Clap exits with this code on its own.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Flow (60-69)
// =============================================================================

/// Config file does not parse or fails validation.
pub const EXIT_FLOW_INVALID_CONFIG: u8 = 60;

/// An input file is missing, unreadable, or lacks a required column.
pub const EXIT_FLOW_INPUT: u8 = 61;

/// Map an engine boundary error to its exit code.
pub fn flow_exit_code(err: &FlowError) -> u8 {
    match err {
        FlowError::ConfigParse(_)
        | FlowError::ConfigValidation(_)
        | FlowError::UnknownStage(_)
        | FlowError::UnknownCategory(_) => EXIT_FLOW_INVALID_CONFIG,
        FlowError::MissingColumn { .. } | FlowError::Csv(_) | FlowError::ReadFile { .. } => {
            EXIT_FLOW_INPUT
        }
    }
}
