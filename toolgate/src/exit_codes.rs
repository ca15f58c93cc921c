//! Stable exit codes for toolgate CLI commands.

/// The tool ran and returned its output.
pub const OK: i32 = 0;
/// Invalid CLI usage, bad configuration, or an I/O failure outside any tool.
pub const INVALID: i32 = 1;
/// The tool ran and reported an error (printed as `Error: ...`).
pub const TOOL_ERROR: i32 = 2;
