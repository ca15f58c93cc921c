//! `write_file`: guarded full-content write with backup of the prior version.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::text::written_line_count;
use crate::error::{ToolError, ToolResult};
use crate::io::backup::create_backup;
use crate::io::config::{CONFIG_FILE_NAME, WriteConfig, config_temp_path};
use crate::io::workspace::{PathResolver, canonicalize_lenient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
    /// Defaults to true.
    #[serde(default)]
    pub create_backup: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct FileWriter {
    resolver: PathResolver,
    /// Absolute backup directory.
    backup_dir: PathBuf,
    blocked_names: Vec<String>,
    blocked_dirs: Vec<String>,
    /// Resolved config files (and their temp siblings) that must never be written.
    protected: Vec<PathBuf>,
}

impl FileWriter {
    pub fn new(resolver: PathResolver, config: &WriteConfig) -> Self {
        let backup_dir = resolver.root().join(&config.backup_dir);
        let default_config = resolver.root().join(CONFIG_FILE_NAME);
        let mut writer = Self {
            resolver,
            backup_dir,
            blocked_names: config.blocked_names.clone(),
            blocked_dirs: config.blocked_dirs.clone(),
            protected: Vec::new(),
        };
        writer.protect_config(&default_config);
        writer
    }

    /// Refuse writes to `path` and its temp sibling. Relative paths are taken
    /// from the workspace root; a file outside the root is unreachable anyway.
    pub fn protect_config(&mut self, path: &Path) {
        for candidate in [path.to_path_buf(), config_temp_path(path)] {
            let absolute = self.resolver.root().join(&candidate);
            if let Ok(resolved) = canonicalize_lenient(&absolute)
                && resolved.starts_with(self.resolver.root())
                && !self.protected.contains(&resolved)
            {
                self.protected.push(resolved);
            }
        }
    }

    #[instrument(skip_all, fields(path = %args.path, bytes = args.content.len()))]
    pub fn write(&self, args: &WriteFileArgs) -> ToolResult<String> {
        let target = self.resolver.resolve(&args.path)?;
        self.ensure_writable(&target, &args.path)?;
        if target.is_dir() {
            return Err(ToolError::IsADirectory {
                path: args.path.clone(),
            });
        }

        let write_failure = |source: io::Error| ToolError::WriteFailure {
            path: args.path.clone(),
            source,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(write_failure)?;
        }

        // The copy must land before the original is replaced; a failed backup abandons the write.
        let backup = if args.create_backup.unwrap_or(true) && target.exists() {
            Some(create_backup(&target, &self.backup_dir).map_err(write_failure)?)
        } else {
            None
        };

        write_atomic(&target, &args.content).map_err(write_failure)?;

        let lines = written_line_count(&args.content);
        info!(lines, backup = backup.is_some(), "file written");
        let mut message = format!("Successfully wrote {lines} lines to {}", args.path);
        if let Some(backup) = backup {
            message.push_str(&format!(" (backup: {})", self.resolver.relative(&backup)));
        }
        Ok(message)
    }

    /// Reject protected names and anything under a protected or backup directory.
    fn ensure_writable(&self, target: &Path, raw: &str) -> ToolResult<()> {
        let blocked = |reason: String| {
            warn!(path = raw, reason = %reason, "write blocked");
            Err(ToolError::WriteBlocked {
                path: raw.to_string(),
                reason,
            })
        };

        if self.protected.iter().any(|path| path == target) {
            return blocked("the active toolgate configuration is read-only".to_string());
        }

        let rel = target.strip_prefix(self.resolver.root()).unwrap_or(target);
        if let Some(name) = rel.file_name().and_then(|name| name.to_str())
            && self
                .blocked_names
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(name))
        {
            return blocked(format!("{name} is a protected file"));
        }

        for component in rel.components() {
            if let Component::Normal(part) = component
                && let Some(part) = part.to_str()
                && self.blocked_dirs.iter().any(|dir| dir == part)
            {
                return blocked(format!("{part} is a protected directory"));
            }
        }

        if target.starts_with(&self.backup_dir) {
            return blocked("backups are read-only".to_string());
        }
        Ok(())
    }
}

/// Write via a sibling temp file and rename, so readers see old or new content, never a mix.
fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{name}.toolgate.tmp"));
    fs::write(&tmp_path, contents)?;
    if let Ok(meta) = fs::metadata(path) {
        // Keep the mode of the file being replaced.
        if let Err(err) = fs::set_permissions(&tmp_path, meta.permissions()) {
            debug!(path = %path.display(), err = %err, "could not carry over file mode");
        }
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            debug!(path = %tmp_path.display(), err = %cleanup, "could not remove temp file");
        }
        return Err(err);
    }
    Ok(())
}
