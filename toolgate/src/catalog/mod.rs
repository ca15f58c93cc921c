//! Tool catalog: names, descriptions and argument schemas.
//!
//! Raw JSON arguments are checked against the tool's JSON Schema before they
//! are deserialized into the typed [`ToolCall`], so a malformed call is
//! reported as every schema violation at once instead of the first serde error.

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ToolError, ToolResult};
use crate::io::config::ToolgateConfig;
use crate::tools::ToolCall;

const CATALOG_TEMPLATE: &str = include_str!("tools.md");

/// Static description of one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    schema: &'static str,
}

impl ToolSpec {
    pub fn schema(&self) -> Result<Value> {
        serde_json::from_str(self.schema).with_context(|| format!("parse schema for {}", self.name))
    }
}

const SPECS: [ToolSpec; 6] = [
    ToolSpec {
        name: "read_file",
        description: "Read a file with line numbers. Large files are cut at max_lines.",
        schema: include_str!("../../schemas/read_file.schema.json"),
    },
    ToolSpec {
        name: "write_file",
        description: "Create or overwrite a file. The previous version is backed up first.",
        schema: include_str!("../../schemas/write_file.schema.json"),
    },
    ToolSpec {
        name: "list_directory",
        description: "Show a directory tree, skipping dependency and VCS folders.",
        schema: include_str!("../../schemas/list_directory.schema.json"),
    },
    ToolSpec {
        name: "search_code",
        description: "Search file contents with a case-insensitive regular expression.",
        schema: include_str!("../../schemas/search_code.schema.json"),
    },
    ToolSpec {
        name: "run_command",
        description: "Run an allow-listed shell command in the workspace with a timeout.",
        schema: include_str!("../../schemas/run_command.schema.json"),
    },
    ToolSpec {
        name: "schema_action",
        description: "Explore SQL migrations, table definitions, RLS policies and TypeScript types.",
        schema: include_str!("../../schemas/schema_action.schema.json"),
    },
];

pub fn specs() -> &'static [ToolSpec] {
    &SPECS
}

pub fn tool_names() -> Vec<&'static str> {
    SPECS.iter().map(|spec| spec.name).collect()
}

struct Entry {
    spec: ToolSpec,
    schema: Value,
    validator: Validator,
}

/// Compiled schemas for every tool.
pub struct Catalog {
    entries: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct ParamView {
    name: String,
    kind: String,
    required: bool,
    description: String,
}

#[derive(Debug, Serialize)]
struct ToolView {
    name: &'static str,
    description: &'static str,
    params: Vec<ParamView>,
}

impl Catalog {
    pub fn load() -> Result<Self> {
        let entries = specs()
            .iter()
            .map(|spec| {
                let schema = spec.schema()?;
                let validator = validator_for(&schema)
                    .map_err(|err| anyhow!("invalid schema for {}: {}", spec.name, err))?;
                Ok(Entry {
                    spec: *spec,
                    schema,
                    validator,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Validate `arguments` for `tool` and build the typed call.
    ///
    /// `null` arguments are treated as `{}`.
    pub fn parse_call(&self, tool: &str, arguments: Value) -> ToolResult<ToolCall> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.spec.name == tool)
            .ok_or_else(|| ToolError::UnknownTool {
                name: tool.to_string(),
                available: tool_names(),
            })?;

        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let violations: Vec<String> = entry
            .validator
            .iter_errors(&arguments)
            .map(|err| err.to_string())
            .collect();
        if !violations.is_empty() {
            debug!(tool, violations = violations.len(), "arguments rejected by schema");
            return Err(ToolError::InvalidArguments {
                tool: tool.to_string(),
                message: violations.join("; "),
            });
        }

        serde_json::from_value(json!({ "tool": tool, "arguments": arguments })).map_err(|err| {
            ToolError::InvalidArguments {
                tool: tool.to_string(),
                message: err.to_string(),
            }
        })
    }

    /// Name, description and schema of every tool, as one JSON array.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|entry| {
                    json!({
                        "name": entry.spec.name,
                        "description": entry.spec.description,
                        "input_schema": entry.schema,
                    })
                })
                .collect(),
        )
    }

    /// Human-readable catalog for `toolgate tools`.
    pub fn render(&self, root: &str, config: &ToolgateConfig) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("tools", CATALOG_TEMPLATE)
            .context("load catalog template")?;
        let tools: Vec<ToolView> = self
            .entries
            .iter()
            .map(|entry| ToolView {
                name: entry.spec.name,
                description: entry.spec.description,
                params: params_of(&entry.schema),
            })
            .collect();
        let rendered = env.get_template("tools")?.render(context! {
            root => root,
            tools => tools,
            allowed_commands => &config.command.allow_prefixes,
            backup_dir => &config.write.backup_dir,
        })?;
        Ok(rendered)
    }
}

fn params_of(schema: &Value) -> Vec<ParamView> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    properties
        .iter()
        .map(|(name, property)| {
            let text = |key: &str| {
                property
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            ParamView {
                name: name.clone(),
                kind: text("type"),
                required: required.contains(&name.as_str()),
                description: text("description"),
            }
        })
        .collect()
}
