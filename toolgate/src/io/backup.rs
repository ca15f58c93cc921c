//! Pre-overwrite backups under the workspace backup directory.
//!
//! Backups are audit artifacts only. Nothing reads them back and nothing
//! prunes them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

/// Copy `source` into `backup_dir` as `<basename>.<timestamp>.bak`.
///
/// The timestamp carries microseconds; if a file with that name already exists
/// a numeric suffix is added, so every call yields a fresh artifact.
pub fn create_backup(source: &Path, backup_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;
    let basename = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();

    let mut target = backup_dir.join(backup_name(&basename, &timestamp, 0));
    let mut attempt = 0u32;
    while target.exists() {
        attempt += 1;
        target = backup_dir.join(backup_name(&basename, &timestamp, attempt));
    }

    fs::copy(source, &target)?;
    info!(source = %source.display(), backup = %target.display(), "created backup");
    Ok(target)
}

fn backup_name(basename: &str, timestamp: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{basename}.{timestamp}.bak")
    } else {
        format!("{basename}.{timestamp}-{attempt}.bak")
    }
}
