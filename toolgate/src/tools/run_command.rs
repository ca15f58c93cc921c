//! `run_command`: gated shell execution with a timeout and bounded output.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::policy::CommandPolicy;
use crate::core::text::truncate_bytes;
use crate::error::{ToolError, ToolResult};
use crate::io::config::CommandConfig;
use crate::io::process::{CommandOutput, CommandRequest, CommandRunner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCommandArgs {
    pub command: String,
    /// Seconds; clamped to `[1, max_timeout_secs]`.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CommandGate<R> {
    policy: CommandPolicy,
    workdir: PathBuf,
    config: CommandConfig,
    runner: R,
}

impl<R: CommandRunner> CommandGate<R> {
    pub fn new(workdir: PathBuf, config: &CommandConfig, runner: R) -> Self {
        Self {
            policy: config.policy(),
            workdir,
            config: config.clone(),
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[instrument(skip_all, fields(command = %args.command))]
    pub fn run(&self, args: &RunCommandArgs) -> ToolResult<String> {
        let command = match self.policy.check(&args.command) {
            Ok(command) => command,
            Err(err) => {
                warn!(kind = err.kind(), "command rejected");
                return Err(err);
            }
        };

        let secs = args
            .timeout
            .unwrap_or(self.config.default_timeout_secs)
            .clamp(1, self.config.max_timeout_secs);
        let request = CommandRequest {
            shell: self.config.shell.clone(),
            command: command.to_string(),
            workdir: self.workdir.clone(),
            env: self.config.env.clone(),
            timeout: Duration::from_secs(secs),
            stdout_limit_bytes: self.config.stdout_limit_bytes,
            stderr_limit_bytes: self.config.stderr_limit_bytes,
        };

        let output = self
            .runner
            .run(&request)
            .map_err(ToolError::ExecutionFailure)?;
        if output.timed_out {
            return Err(ToolError::Timeout { secs });
        }
        info!(exit_code = output.exit_code, "command finished");
        Ok(render_output(&output, self.config.total_limit_bytes))
    }
}

fn render_output(output: &CommandOutput, total_limit: usize) -> String {
    let mut text = String::new();
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        text.push_str(&format!("STDOUT:\n{stdout}\n"));
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        text.push_str(&format!("STDERR:\n{stderr}\n"));
    }
    text.push_str(&format!("\nExit code: {}", output.exit_code));

    let (kept, dropped) = truncate_bytes(&text, total_limit);
    if dropped == 0 {
        return text;
    }
    warn!(dropped, "command output truncated");
    format!("{kept}\n... (output truncated)")
}
