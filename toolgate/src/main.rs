//! Command-line front end for the workspace tools.
//!
//! One-shot subcommands print the tool's text and exit with
//! [`exit_codes::TOOL_ERROR`] when the tool reported an error. `serve` speaks
//! the JSON-lines protocol on stdin/stdout.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use toolgate::catalog::Catalog;
use toolgate::exit_codes;
use toolgate::io::config::{CONFIG_FILE_NAME, ToolgateConfig, load_config, write_config};
use toolgate::logging;
use toolgate::serve::serve;
use toolgate::tools::list_directory::ListDirectoryArgs;
use toolgate::tools::read_file::ReadFileArgs;
use toolgate::tools::run_command::RunCommandArgs;
use toolgate::tools::schema::{SchemaActionKind, SchemaArgs};
use toolgate::tools::search_code::SearchCodeArgs;
use toolgate::tools::write_file::WriteFileArgs;
use toolgate::tools::{ToolCall, ToolOutput, Toolbox};

#[derive(Parser)]
#[command(
    name = "toolgate",
    version,
    about = "Workspace-confined file, search, shell and schema tools for coding agents"
)]
struct Cli {
    /// Workspace root every tool is confined to.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Config file (default: <root>/.toolgate.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file into the workspace.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    #[command(flatten)]
    Workspace(WorkspaceCommand),
}

/// Subcommands that operate on an opened workspace.
#[derive(Subcommand)]
enum WorkspaceCommand {
    /// Print a file with line numbers.
    Read {
        path: String,
        /// Lines to print (0 = all).
        #[arg(long)]
        max_lines: Option<usize>,
    },
    /// Write a file, backing up the previous version.
    Write {
        path: String,
        /// New content; read from stdin when omitted.
        #[arg(long)]
        content: Option<String>,
        /// Skip the backup of an existing file.
        #[arg(long)]
        no_backup: bool,
    },
    /// Print a directory tree.
    Ls {
        path: Option<String>,
        #[arg(long)]
        depth: Option<usize>,
        /// Hide files, show directories only.
        #[arg(long)]
        dirs_only: bool,
    },
    /// Search file contents with a case-insensitive regex.
    Search {
        pattern: String,
        #[arg(long)]
        path: Option<String>,
        /// Only files with this extension (e.g. `.tsx`).
        #[arg(long)]
        ext: Option<String>,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Run an allow-listed shell command.
    Run {
        command: String,
        /// Timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Inspect SQL migrations and TypeScript types.
    Schema {
        #[arg(value_enum)]
        action: SchemaActionKind,
        target: Option<String>,
    },
    /// Invoke any tool with JSON arguments, validated against its schema.
    Call {
        tool: String,
        #[arg(default_value = "{}")]
        arguments: String,
    },
    /// Answer JSON-lines requests on stdin until EOF.
    Serve,
    /// Describe the available tools.
    Tools {
        /// Emit names, descriptions and argument schemas as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILE_NAME));

    match cli.command {
        Command::Init { force } => cmd_init(&config_path, force),
        Command::Workspace(command) => run_in_workspace(&cli.root, &config_path, command),
    }
}

fn run_in_workspace(root: &Path, config_path: &Path, command: WorkspaceCommand) -> Result<i32> {
    let config = load_config(config_path)?;
    debug!(config = %config_path.display(), "configuration loaded");
    let config_path = std::path::absolute(config_path)
        .with_context(|| format!("resolve config path {}", config_path.display()))?;
    let toolbox = Toolbox::new(root, &config)
        .with_context(|| format!("open workspace {}", root.display()))?
        .protect_config(&config_path);
    let catalog = Catalog::load()?;

    let call = match command {
        WorkspaceCommand::Serve => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            serve(&toolbox, &catalog, stdin.lock(), stdout.lock())?;
            return Ok(exit_codes::OK);
        }
        WorkspaceCommand::Tools { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog.to_json())?);
            } else {
                print!("{}", catalog.render(&root.display().to_string(), &config)?);
            }
            return Ok(exit_codes::OK);
        }
        WorkspaceCommand::Call { tool, arguments } => {
            let arguments: Value =
                serde_json::from_str(&arguments).context("parse arguments as JSON")?;
            match catalog.parse_call(&tool, arguments) {
                Ok(call) => call,
                Err(err) => return Ok(print_output(&ToolOutput::failure(err.kind(), err))),
            }
        }
        WorkspaceCommand::Read { path, max_lines } => ToolCall::ReadFile(ReadFileArgs { path, max_lines }),
        WorkspaceCommand::Write {
            path,
            content,
            no_backup,
        } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            ToolCall::WriteFile(WriteFileArgs {
                path,
                content,
                create_backup: Some(!no_backup),
            })
        }
        WorkspaceCommand::Ls {
            path,
            depth,
            dirs_only,
        } => ToolCall::ListDirectory(ListDirectoryArgs {
            path,
            max_depth: depth,
            show_files: Some(!dirs_only),
        }),
        WorkspaceCommand::Search {
            pattern,
            path,
            ext,
            max_results,
        } => ToolCall::SearchCode(SearchCodeArgs {
            pattern,
            path,
            file_extension: ext,
            max_results,
        }),
        WorkspaceCommand::Run { command, timeout } => ToolCall::RunCommand(RunCommandArgs { command, timeout }),
        WorkspaceCommand::Schema { action, target } => ToolCall::SchemaAction(SchemaArgs { action, target }),
    };

    Ok(print_output(&toolbox.invoke(&call)))
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &ToolgateConfig::default())?;
    println!("Wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn print_output(output: &ToolOutput) -> i32 {
    println!("{}", output.text);
    if output.is_error {
        exit_codes::TOOL_ERROR
    } else {
        exit_codes::OK
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("read content from stdin")?;
    Ok(buf)
}
