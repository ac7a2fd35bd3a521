//! Stable exit codes for roaster CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to storage, configuration or other I/O errors.
pub const FAILED: i32 = 1;
/// Unknown command or malformed arguments (clap's usage exit code).
pub const USAGE: i32 = 2;
/// Command rejected by validation (out of range or fan interlock).
pub const REJECTED: i32 = 3;
/// State was saved but the outputs could not be updated to match it.
pub const DIVERGED: i32 = 4;
