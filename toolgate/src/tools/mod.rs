//! The six workspace tools and the dispatcher that owns them.

pub mod list_directory;
pub mod read_file;
pub mod run_command;
pub mod schema;
pub mod search_code;
pub mod write_file;

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ToolResult;
use crate::io::config::ToolgateConfig;
use crate::io::process::{CommandRunner, ShellRunner};
use crate::io::workspace::PathResolver;

use self::list_directory::{DirectoryTree, ListDirectoryArgs};
use self::read_file::{FileReader, ReadFileArgs};
use self::run_command::{CommandGate, RunCommandArgs};
use self::schema::{SchemaArgs, SchemaIntrospector};
use self::search_code::{CodeSearch, SearchCodeArgs};
use self::write_file::{FileWriter, WriteFileArgs};

/// One typed tool invocation.
///
/// Serialized as `{"tool": "<name>", "arguments": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ReadFile(ReadFileArgs),
    WriteFile(WriteFileArgs),
    ListDirectory(ListDirectoryArgs),
    SearchCode(SearchCodeArgs),
    RunCommand(RunCommandArgs),
    SchemaAction(SchemaArgs),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile(_) => "read_file",
            Self::WriteFile(_) => "write_file",
            Self::ListDirectory(_) => "list_directory",
            Self::SearchCode(_) => "search_code",
            Self::RunCommand(_) => "run_command",
            Self::SchemaAction(_) => "schema_action",
        }
    }
}

/// Text handed back to the caller. Errors are text too; `is_error` marks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl ToolOutput {
    pub fn success(text: String) -> Self {
        Self {
            text,
            is_error: false,
            error_kind: None,
        }
    }

    pub fn failure(kind: &'static str, message: impl std::fmt::Display) -> Self {
        Self {
            text: format!("Error: {message}"),
            is_error: true,
            error_kind: Some(kind),
        }
    }
}

/// All tools bound to one workspace root and one configuration.
#[derive(Debug, Clone)]
pub struct Toolbox<R = ShellRunner> {
    tree: DirectoryTree,
    reader: FileReader,
    writer: FileWriter,
    search: CodeSearch,
    gate: CommandGate<R>,
    schema: SchemaIntrospector,
}

impl Toolbox<ShellRunner> {
    pub fn new(root: impl AsRef<Path>, config: &ToolgateConfig) -> Result<Self> {
        Self::with_runner(root, config, ShellRunner)
    }
}

impl<R: CommandRunner> Toolbox<R> {
    /// Build every tool with a custom process runner.
    pub fn with_runner(root: impl AsRef<Path>, config: &ToolgateConfig, runner: R) -> Result<Self> {
        config.validate()?;
        let resolver = PathResolver::new(root)?;
        let skip = config.skip_set();
        info!(root = %resolver.root().display(), "toolbox ready");
        Ok(Self {
            tree: DirectoryTree::new(resolver.clone(), skip.clone(), &config.limits),
            reader: FileReader::new(resolver.clone(), config.limits.read_default_max_lines),
            writer: FileWriter::new(resolver.clone(), &config.write),
            search: CodeSearch::new(resolver.clone(), skip.clone(), &config.traversal, &config.limits),
            gate: CommandGate::new(resolver.root().to_path_buf(), &config.command, runner),
            schema: SchemaIntrospector::new(resolver, skip, &config.traversal, &config.limits),
        })
    }

    /// Also refuse writes to the config file at `path` (the workspace default is
    /// always protected).
    pub fn protect_config(mut self, path: impl AsRef<Path>) -> Self {
        self.writer.protect_config(path.as_ref());
        self
    }

    pub fn runner(&self) -> &R {
        self.gate.runner()
    }

    /// Run one call and keep the typed error.
    pub fn run(&self, call: &ToolCall) -> ToolResult<String> {
        match call {
            ToolCall::ReadFile(args) => self.reader.read(args),
            ToolCall::WriteFile(args) => self.writer.write(args),
            ToolCall::ListDirectory(args) => self.tree.render(args),
            ToolCall::SearchCode(args) => self.search.search(args),
            ToolCall::RunCommand(args) => self.gate.run(args),
            ToolCall::SchemaAction(args) => self.schema.run(args),
        }
    }

    /// Run one call and render any error as `Error: ...` text.
    #[instrument(skip_all, fields(tool = call.name()))]
    pub fn invoke(&self, call: &ToolCall) -> ToolOutput {
        match self.run(call) {
            Ok(text) => ToolOutput::success(text),
            Err(err) => {
                warn!(kind = err.kind(), err = %err, "tool failed");
                ToolOutput::failure(err.kind(), err)
            }
        }
    }
}
