//! `read_file`: line-numbered file content with a line cap.

use std::fs;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::text::{number_lines, rule};
use crate::error::{ToolError, ToolResult};
use crate::io::workspace::PathResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileArgs {
    pub path: String,
    /// `0` means unlimited.
    #[serde(default)]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FileReader {
    resolver: PathResolver,
    default_max_lines: usize,
}

impl FileReader {
    pub fn new(resolver: PathResolver, default_max_lines: usize) -> Self {
        Self {
            resolver,
            default_max_lines,
        }
    }

    #[instrument(skip_all, fields(path = %args.path))]
    pub fn read(&self, args: &ReadFileArgs) -> ToolResult<String> {
        let path = self.resolver.resolve(&args.path)?;
        if !path.exists() {
            return Err(ToolError::NotFound {
                path: args.path.clone(),
            });
        }
        if path.is_dir() {
            return Err(ToolError::IsADirectory {
                path: args.path.clone(),
            });
        }

        let bytes = fs::read(&path).map_err(|source| ToolError::ReadFailure {
            path: args.path.clone(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let max_lines = args.max_lines.unwrap_or(self.default_max_lines);
        let shown = if max_lines == 0 {
            total
        } else {
            total.min(max_lines)
        };

        let mut out = format!("File: {} ({total} lines total)\n{}\n", args.path, rule(60));
        out.push_str(&number_lines(lines[..shown].iter().copied()));
        if shown < total {
            out.push_str(&format!("\n\n... ({} more lines truncated)", total - shown));
        }
        Ok(out)
    }
}
