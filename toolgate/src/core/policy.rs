//! Command gating: literal allow-prefixes, then case-insensitive deny-substrings.
//!
//! This is string matching, not confinement. A command that passes both
//! checks runs with the full privileges of the process; chaining (`;`, `&&`),
//! subshells and redirection are only caught when a deny-substring happens to
//! cover them.

use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    allow_prefixes: Vec<String>,
    /// Stored lowercase; matched against the lowercased command.
    deny_substrings: Vec<String>,
}

impl CommandPolicy {
    pub fn new(allow_prefixes: Vec<String>, deny_substrings: Vec<String>) -> Self {
        Self {
            allow_prefixes,
            deny_substrings: deny_substrings
                .into_iter()
                .map(|pattern| pattern.to_lowercase())
                .collect(),
        }
    }

    pub fn allow_prefixes(&self) -> &[String] {
        &self.allow_prefixes
    }

    /// Run both checks and return the trimmed command that should be executed.
    ///
    /// The allow check runs first; the deny check may veto an allowed command.
    pub fn check<'a>(&self, command: &'a str) -> ToolResult<&'a str> {
        let command = command.trim();
        if !self
            .allow_prefixes
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
        {
            return Err(ToolError::CommandNotAllowed {
                command: command.to_string(),
                allowed: self.allow_prefixes.clone(),
            });
        }

        let lowered = command.to_lowercase();
        if let Some(pattern) = self
            .deny_substrings
            .iter()
            .find(|pattern| lowered.contains(pattern.as_str()))
        {
            return Err(ToolError::DangerousCommand {
                command: command.to_string(),
                pattern: pattern.clone(),
            });
        }

        Ok(command)
    }
}
