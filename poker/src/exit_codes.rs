//! Stable exit codes for `poker` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed on configuration or another error before reaching services.
pub const INVALID: i32 = 1;
/// `poker pass` completed but a service ended in `error:*` or a declared entry was invalid.
pub const SERVICE_FAILED: i32 = 2;
