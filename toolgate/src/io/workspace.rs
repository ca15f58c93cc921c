//! Workspace containment: every filesystem tool resolves caller paths here.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};

/// Resolves caller-supplied paths against a fixed, canonical workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Canonicalize `root` once; it must exist and be a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root)
            .with_context(|| format!("canonicalize workspace root {}", root.display()))?;
        if !canonical.is_dir() {
            return Err(anyhow!(
                "workspace root {} is not a directory",
                canonical.display()
            ));
        }
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `raw` (absolute, or relative to the root) to its canonical form.
    ///
    /// Symlinks and `..` are resolved before the containment check. Components
    /// that do not exist yet are appended lexically to the canonical form of the
    /// deepest existing ancestor, which is exact because a missing component
    /// cannot be a symlink. Existence of the final path is not checked.
    pub fn resolve(&self, raw: &str) -> ToolResult<PathBuf> {
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let resolved = canonicalize_lenient(&joined).map_err(|source| ToolError::ReadFailure {
            path: raw.to_string(),
            source,
        })?;

        if !resolved.starts_with(&self.root) {
            warn!(path = raw, resolved = %resolved.display(), "path escapes workspace");
            return Err(ToolError::AccessDenied {
                path: raw.to_string(),
                root: self.root.display().to_string(),
            });
        }
        debug!(path = raw, resolved = %resolved.display(), "resolved path");
        Ok(resolved)
    }

    /// `/`-separated path of `path` relative to the root, for display.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let rendered = rel
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if rendered.is_empty() {
            ".".to_string()
        } else {
            rendered
        }
    }
}

/// Canonicalize `path`, tolerating a missing tail.
pub(crate) fn canonicalize_lenient(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    loop {
        match fs::canonicalize(&existing) {
            Ok(base) => return Ok(append_lexically(base, tail.iter().rev())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let name = match existing.components().next_back() {
                    Some(component) => component.as_os_str().to_owned(),
                    None => return Err(err),
                };
                if !existing.pop() {
                    return Err(err);
                }
                tail.push(name);
            }
            Err(err) => return Err(err),
        }
    }
}

fn append_lexically<'a, I>(mut base: PathBuf, tail: I) -> PathBuf
where
    I: Iterator<Item = &'a std::ffi::OsString>,
{
    for name in tail {
        match Path::new(name).components().next() {
            Some(Component::ParentDir) => {
                base.pop();
            }
            Some(Component::CurDir) | None => {}
            Some(_) => base.push(name),
        }
    }
    base
}
