//! Error taxonomy shared by every tool.
//!
//! Tools return `Result<String, ToolError>` internally. The dispatch boundary
//! ([`crate::tools::Toolbox::invoke`]) renders every variant as `Error: ...`
//! text, so a caller always receives something it can read.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Access denied: '{path}' resolves outside the workspace {root}")]
    AccessDenied { path: String, root: String },

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("{path} is a file, not a directory.")]
    NotADirectory { path: String },

    #[error("{path} is a directory. Use list_directory instead.")]
    IsADirectory { path: String },

    #[error("Writing to {path} is not allowed for safety ({reason}).")]
    WriteBlocked { path: String, reason: String },

    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Command not allowed: '{command}'\nAllowed commands: {}", allowed.join(", "))]
    CommandNotAllowed {
        command: String,
        allowed: Vec<String>,
    },

    #[error("Dangerous pattern '{pattern}' detected in command.")]
    DangerousCommand { command: String, pattern: String },

    #[error("Command timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Failed to execute command: {0:#}")]
    ExecutionFailure(anyhow::Error),

    #[error("Failed to read {path}: {source}")]
    ReadFailure {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Action '{action}' requires a target. {hint}")]
    MissingTarget {
        action: &'static str,
        hint: &'static str,
    },

    #[error("Invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Unknown tool '{name}'. Available tools: {}", available.join(", "))]
    UnknownTool {
        name: String,
        available: Vec<&'static str>,
    },
}

impl ToolError {
    /// Short stable name of the variant, used in logs and the stdio protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "access_denied",
            Self::NotFound { .. } => "not_found",
            Self::NotADirectory { .. } => "not_a_directory",
            Self::IsADirectory { .. } => "is_a_directory",
            Self::WriteBlocked { .. } => "write_blocked",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::CommandNotAllowed { .. } => "command_not_allowed",
            Self::DangerousCommand { .. } => "dangerous_command",
            Self::Timeout { .. } => "timeout",
            Self::ExecutionFailure(_) => "execution_failure",
            Self::ReadFailure { .. } => "read_failure",
            Self::WriteFailure { .. } => "write_failure",
            Self::MissingTarget { .. } => "missing_target",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::UnknownTool { .. } => "unknown_tool",
        }
    }
}

pub type ToolResult<T = String> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_not_allowed_lists_prefixes() {
        let err = ToolError::CommandNotAllowed {
            command: "curl x".to_string(),
            allowed: vec!["git log".to_string(), "ls ".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("'curl x'"));
        assert!(message.contains("Allowed commands: git log, ls "));
        assert_eq!(err.kind(), "command_not_allowed");
    }

    #[test]
    fn execution_failure_keeps_context_chain() {
        let source = anyhow::anyhow!("no such file").context("spawn command");
        let err = ToolError::ExecutionFailure(source);
        assert_eq!(
            err.to_string(),
            "Failed to execute command: spawn command: no such file"
        );
    }
}
