//! Test-only helpers for building throwaway workspaces.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::io::config::ToolgateConfig;
use crate::io::process::CommandRunner;
use crate::tools::Toolbox;

/// A temporary workspace root, removed on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read file")
    }

    /// Toolbox over this workspace with the default configuration.
    pub fn toolbox(&self) -> Toolbox {
        Toolbox::new(self.root(), &ToolgateConfig::default()).expect("toolbox")
    }

    /// Toolbox with a custom configuration and process runner.
    pub fn toolbox_with<R: CommandRunner>(&self, config: &ToolgateConfig, runner: R) -> Toolbox<R> {
        Toolbox::with_runner(self.root(), config, runner).expect("toolbox")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
