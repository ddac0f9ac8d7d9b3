//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Description                                   |
//! |------|-----------------------------------------------|
//! | 0    | Success                                       |
//! | 1    | A command was rejected, or a formula failed   |
//! | 2    | Usage or I/O error (bad args, missing file)   |

/// Success - every command committed.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one command was rejected by the engine.
/// `eval` also uses it when the formula evaluates to an error value.
pub const EXIT_REJECTED: u8 = 1;

/// Usage error - bad arguments, unreadable script or config.
pub const EXIT_USAGE: u8 = 2;
