//! Toolgate configuration stored in `<workspace>/.toolgate.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::policy::CommandPolicy;
use crate::core::types::SkipSet;

/// Default config file name, relative to the workspace root.
pub const CONFIG_FILE_NAME: &str = ".toolgate.toml";

/// Toolgate configuration (TOML).
///
/// Every section is optional; missing fields fall back to the defaults below.
/// The loaded value is immutable for the life of the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolgateConfig {
    pub limits: LimitsConfig,
    pub traversal: TraversalConfig,
    pub write: WriteConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Entry lines emitted by `list_directory` before truncating.
    pub tree_max_entries: usize,
    /// Upper clamp for `list_directory` depth.
    pub tree_max_depth: usize,
    pub tree_default_depth: usize,
    /// `read_file` line cap when the caller does not pass one.
    pub read_default_max_lines: usize,
    /// Directory searched by `search_code` when the caller does not pass one.
    pub search_default_path: String,
    pub search_default_max_results: usize,
    /// Hard ceiling on caller-supplied `max_results`.
    pub search_max_results: usize,
    /// Bytes of a migration returned by `read_migration`.
    pub migration_max_bytes: usize,
    /// Type definitions returned by `analyze_types`.
    pub type_max_matches: usize,
    /// Files larger than this are skipped by content scans (search and schema lookups).
    pub scan_max_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            tree_max_entries: 500,
            tree_max_depth: 5,
            tree_default_depth: 3,
            read_default_max_lines: 200,
            search_default_path: "src".to_string(),
            search_default_max_results: 30,
            search_max_results: 1_000,
            migration_max_bytes: 5_000,
            type_max_matches: 3,
            scan_max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TraversalConfig {
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    /// Extensions (without the dot) scanned by `search_code` when no filter is given.
    pub text_extensions: Vec<String>,
    pub sql_extensions: Vec<String>,
    pub typed_source_extensions: Vec<String>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            skip_dirs: strings(&[
                ".git",
                "node_modules",
                ".next",
                ".venv",
                "__pycache__",
                ".netlify",
                "target",
            ]),
            text_extensions: strings(&[
                "ts", "tsx", "js", "jsx", "json", "md", "yaml", "yml", "css", "html", "sql", "py",
                "toml", "txt", "env", "sh", "csv", "xml", "svg",
            ]),
            sql_extensions: strings(&["sql"]),
            typed_source_extensions: strings(&["ts", "tsx"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WriteConfig {
    /// Workspace-relative directory receiving pre-overwrite copies.
    pub backup_dir: String,
    /// File names that may never be written.
    pub blocked_names: Vec<String>,
    /// Directory names that may never be written into, at any depth.
    pub blocked_dirs: Vec<String>,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            backup_dir: ".agent_backups".to_string(),
            blocked_names: strings(&[".env", ".env.local", "package-lock.json"]),
            blocked_dirs: strings(&["node_modules"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// The trimmed command must start with one of these, literally.
    pub allow_prefixes: Vec<String>,
    /// Case-insensitive substrings that veto an otherwise allowed command.
    pub deny_substrings: Vec<String>,
    /// Shell used as `<shell> -c <command>`.
    pub shell: String,
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub stdout_limit_bytes: usize,
    pub stderr_limit_bytes: usize,
    /// Cap on the combined rendered output.
    pub total_limit_bytes: usize,
    /// Variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            allow_prefixes: strings(&[
                "npm run build",
                "npm run lint",
                "npm run dev",
                "npx tsc",
                "npx next",
                "node ",
                "cat ",
                "ls ",
                "wc ",
                "git log",
                "git status",
                "git diff",
                "git show",
            ]),
            deny_substrings: strings(&[
                "rm ",
                "rm -",
                "rmdir",
                "sudo",
                "> /",
                "chmod",
                "chown",
                "install",
                "push",
                "--force",
                "reset --hard",
                "drop ",
                "delete ",
                "truncate",
            ]),
            shell: "sh".to_string(),
            default_timeout_secs: 120,
            max_timeout_secs: 300,
            stdout_limit_bytes: 5_000,
            stderr_limit_bytes: 3_000,
            total_limit_bytes: 8_000,
            env: BTreeMap::from([
                ("CI".to_string(), "true".to_string()),
                ("NODE_ENV".to_string(), "production".to_string()),
            ]),
        }
    }
}

impl ToolgateConfig {
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.tree_max_entries == 0 {
            return Err(anyhow!("limits.tree_max_entries must be > 0"));
        }
        if limits.tree_max_depth == 0 {
            return Err(anyhow!("limits.tree_max_depth must be > 0"));
        }
        if limits.search_max_results == 0 {
            return Err(anyhow!("limits.search_max_results must be > 0"));
        }
        if limits.migration_max_bytes == 0 {
            return Err(anyhow!("limits.migration_max_bytes must be > 0"));
        }
        if limits.type_max_matches == 0 {
            return Err(anyhow!("limits.type_max_matches must be > 0"));
        }
        if limits.scan_max_file_bytes == 0 {
            return Err(anyhow!("limits.scan_max_file_bytes must be > 0"));
        }

        let backup = Path::new(&self.write.backup_dir);
        if self.write.backup_dir.trim().is_empty()
            || !backup
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(anyhow!(
                "write.backup_dir must be a relative path inside the workspace (got {:?})",
                self.write.backup_dir
            ));
        }

        let command = &self.command;
        if command.allow_prefixes.is_empty()
            || command
                .allow_prefixes
                .iter()
                .any(|prefix| prefix.trim().is_empty())
        {
            return Err(anyhow!(
                "command.allow_prefixes must be a non-empty array of non-empty prefixes"
            ));
        }
        if command.deny_substrings.iter().any(|s| s.is_empty()) {
            return Err(anyhow!("command.deny_substrings must not contain empty strings"));
        }
        if command.shell.trim().is_empty() {
            return Err(anyhow!("command.shell must be non-empty"));
        }
        if command.max_timeout_secs == 0 || command.default_timeout_secs == 0 {
            return Err(anyhow!("command timeouts must be > 0"));
        }
        if command.stdout_limit_bytes == 0
            || command.stderr_limit_bytes == 0
            || command.total_limit_bytes == 0
        {
            return Err(anyhow!("command output limits must be > 0"));
        }
        Ok(())
    }

    /// Configured skip set plus the backup directory's first component.
    pub fn skip_set(&self) -> SkipSet {
        let mut skip = SkipSet::new(self.traversal.skip_dirs.iter().cloned());
        if let Some(Component::Normal(first)) = Path::new(&self.write.backup_dir).components().next()
        {
            skip.insert(first.to_string_lossy().into_owned());
        }
        skip
    }
}

impl CommandConfig {
    pub fn policy(&self) -> CommandPolicy {
        CommandPolicy::new(self.allow_prefixes.clone(), self.deny_substrings.clone())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ToolgateConfig::default()`.
pub fn load_config(path: &Path) -> Result<ToolgateConfig> {
    if !path.exists() {
        let cfg = ToolgateConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ToolgateConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ToolgateConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Sibling used while a config file is being replaced.
pub fn config_temp_path(path: &Path) -> PathBuf {
    path.with_extension("toml.tmp")
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = config_temp_path(path);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}
