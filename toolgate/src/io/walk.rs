//! Bounded recursive file discovery shared by search and schema tools.

use std::fs;
use std::ops::ControlFlow;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::core::types::SkipSet;

/// Visit regular files under `root` in sorted traversal order.
///
/// Directories named in `skip` are pruned (the root itself is never pruned).
/// Symbolic links are neither followed nor reported, so a link cannot lead a
/// scan outside the workspace. Entries that fail to read are skipped. The
/// visitor may stop the walk early by returning `ControlFlow::Break`.
pub fn walk_files<F>(root: &Path, skip: &SkipSet, mut visit: F)
where
    F: FnMut(&Path) -> ControlFlow<()>,
{
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !(entry.file_type().is_dir() && skip.contains(entry.file_name()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(err = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if visit(entry.path()).is_break() {
            break;
        }
    }
}

/// File content for a scan, decoded lossily. `None` (logged at debug) when the
/// file is larger than `max_bytes` or cannot be read.
pub fn read_scannable(path: &Path, max_bytes: u64) -> Option<String> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > max_bytes => {
            debug!(path = %path.display(), bytes = meta.len(), max_bytes, "skipping oversized file");
            return None;
        }
        Ok(_) => {}
        Err(err) => {
            debug!(path = %path.display(), err = %err, "skipping unreadable file");
            return None;
        }
    }
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            debug!(path = %path.display(), err = %err, "skipping unreadable file");
            None
        }
    }
}

/// Lowercased extension of `path` without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// True when `path` has one of `extensions` (compared case-insensitively).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    extension_of(path)
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)))
}
