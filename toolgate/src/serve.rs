//! JSON-lines request loop for `toolgate serve`.
//!
//! One request per input line, one response per request, in order:
//!
//! ```text
//! -> {"id": 1, "tool": "read_file", "arguments": {"path": "src/app.ts"}}
//! <- {"id": 1, "tool": "read_file", "output": "File: ...", "is_error": false}
//! ```
//!
//! A line that cannot be parsed still gets a response (with `id: null` when the
//! id is unreadable) and the loop keeps going. EOF ends the loop.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::catalog::Catalog;
use crate::io::process::CommandRunner;
use crate::tools::{ToolOutput, Toolbox};

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    tool: String,
    output: String,
    is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
}

/// Totals reported when the input ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub requests: usize,
    pub errors: usize,
}

#[instrument(skip_all)]
pub fn serve<R, I, O>(toolbox: &Toolbox<R>, catalog: &Catalog, input: I, mut output: O) -> Result<ServeStats>
where
    R: CommandRunner,
    I: BufRead,
    O: Write,
{
    let mut stats = ServeStats::default();
    for line in input.lines() {
        let line = line.context("read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(toolbox, catalog, &line);
        stats.requests += 1;
        if response.is_error {
            stats.errors += 1;
        }
        let mut encoded = serde_json::to_string(&response).context("encode response")?;
        encoded.push('\n');
        output
            .write_all(encoded.as_bytes())
            .context("write response")?;
        output.flush().context("flush response")?;
    }
    info!(requests = stats.requests, errors = stats.errors, "input closed");
    Ok(stats)
}

fn handle_line<R: CommandRunner>(toolbox: &Toolbox<R>, catalog: &Catalog, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            debug!(err = %err, "malformed request");
            let id = serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|value| value.get("id").cloned())
                .unwrap_or(Value::Null);
            return respond(
                id,
                String::new(),
                ToolOutput::failure("malformed_request", format_args!("Malformed request: {err}")),
            );
        }
    };

    let output = match catalog.parse_call(&request.tool, request.arguments) {
        Ok(call) => toolbox.invoke(&call),
        Err(err) => ToolOutput::failure(err.kind(), err),
    };
    respond(request.id, request.tool, output)
}

fn respond(id: Value, tool: String, output: ToolOutput) -> Response {
    Response {
        id,
        tool,
        output: output.text,
        is_error: output.is_error,
        error_kind: output.error_kind,
    }
}
