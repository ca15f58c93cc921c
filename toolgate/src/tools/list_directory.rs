//! `list_directory`: bounded, indented directory tree.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::SkipSet;
use crate::error::{ToolError, ToolResult};
use crate::io::config::LimitsConfig;
use crate::io::workspace::PathResolver;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDirectoryArgs {
    /// Directory to render; defaults to the workspace root.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub show_files: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct DirectoryTree {
    resolver: PathResolver,
    skip: SkipSet,
    max_entries: usize,
    max_depth: usize,
    default_depth: usize,
}

impl DirectoryTree {
    pub fn new(resolver: PathResolver, skip: SkipSet, limits: &LimitsConfig) -> Self {
        Self {
            resolver,
            skip,
            max_entries: limits.tree_max_entries,
            max_depth: limits.tree_max_depth,
            default_depth: limits.tree_default_depth,
        }
    }

    #[instrument(skip_all, fields(path = args.path.as_deref().unwrap_or(".")))]
    pub fn render(&self, args: &ListDirectoryArgs) -> ToolResult<String> {
        let raw = args.path.as_deref().unwrap_or(".");
        let dir = self.resolver.resolve(raw)?;
        if !dir.exists() {
            return Err(ToolError::NotFound {
                path: raw.to_string(),
            });
        }
        if !dir.is_dir() {
            return Err(ToolError::NotADirectory {
                path: raw.to_string(),
            });
        }

        let depth = args
            .max_depth
            .unwrap_or(self.default_depth)
            .clamp(1, self.max_depth);
        let show_files = args.show_files.unwrap_or(true);

        let mut lines = TreeLines::new(self.max_entries);
        self.walk(&dir, "", 0, depth, show_files, &mut lines);

        let mut out = vec![format!("Directory: {}/", raw.trim_end_matches('/'))];
        out.extend(lines.finish());
        Ok(out.join("\n"))
    }

    fn walk(
        &self,
        dir: &Path,
        prefix: &str,
        depth: usize,
        max_depth: usize,
        show_files: bool,
        lines: &mut TreeLines,
    ) {
        if depth >= max_depth || lines.is_full() {
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), err = %err, "cannot list directory");
                lines.push(format!("{prefix}{}", unreadable_marker(&err)));
                return;
            }
        };

        let mut dirs: Vec<Listed> = Vec::new();
        let mut files: Vec<Listed> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            if kind.is_symlink() {
                // Links are shown with their target and never entered.
                let to_dir = fs::metadata(entry.path()).is_ok_and(|meta| meta.is_dir());
                if to_dir && self.skip.contains(&name) {
                    continue;
                }
                let target = fs::read_link(entry.path())
                    .map(|target| target.display().to_string())
                    .unwrap_or_else(|_| "?".to_string());
                let slash = if to_dir { "/" } else { "" };
                let label = format!("{}{slash} -> {target}", name.to_string_lossy());
                let listed = Listed::leaf(name, label);
                if to_dir {
                    dirs.push(listed);
                } else {
                    files.push(listed);
                }
            } else if kind.is_dir() {
                if !self.skip.contains(&name) {
                    let label = format!("{}/", name.to_string_lossy());
                    dirs.push(Listed {
                        name,
                        label,
                        descend: true,
                    });
                }
            } else {
                let label = name.to_string_lossy().into_owned();
                files.push(Listed::leaf(name, label));
            }
        }
        dirs.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut listed = dirs;
        if show_files {
            listed.extend(files);
        }

        let count = listed.len();
        for (idx, entry) in listed.into_iter().enumerate() {
            if lines.is_full() {
                return;
            }
            let last = idx + 1 == count;
            let connector = if last { LAST_BRANCH } else { BRANCH };
            lines.push(format!("{prefix}{connector}{}", entry.label));
            if entry.descend {
                let extension = if last { SPACE } else { PIPE };
                self.walk(
                    &dir.join(&entry.name),
                    &format!("{prefix}{extension}"),
                    depth + 1,
                    max_depth,
                    show_files,
                    lines,
                );
            }
        }
    }
}

/// One rendered tree entry.
struct Listed {
    name: OsString,
    label: String,
    descend: bool,
}

impl Listed {
    fn leaf(name: OsString, label: String) -> Self {
        Self {
            name,
            label,
            descend: false,
        }
    }
}

fn unreadable_marker(err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::PermissionDenied {
        "[permission denied]".to_string()
    } else {
        format!("[unreadable: {err}]")
    }
}

/// Entry lines with a hard cap. One line past the cap is collected so overflow
/// is detectable; `finish` drops it and appends the marker.
struct TreeLines {
    lines: Vec<String>,
    cap: usize,
}

impl TreeLines {
    fn new(cap: usize) -> Self {
        Self {
            lines: Vec::new(),
            cap,
        }
    }

    fn push(&mut self, line: String) {
        if !self.is_full() {
            self.lines.push(line);
        }
    }

    fn is_full(&self) -> bool {
        self.lines.len() > self.cap
    }

    fn finish(mut self) -> Vec<String> {
        if self.is_full() {
            self.lines.truncate(self.cap);
            self.lines
                .push(format!("... (output truncated at {} entries)", self.cap));
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_for(root: &Path, max_entries: usize) -> DirectoryTree {
        let limits = LimitsConfig {
            tree_max_entries: max_entries,
            ..LimitsConfig::default()
        };
        DirectoryTree::new(
            PathResolver::new(root).expect("resolver"),
            SkipSet::new([".git", "node_modules"]),
            &limits,
        )
    }

    fn args(path: &str, max_depth: usize, show_files: bool) -> ListDirectoryArgs {
        ListDirectoryArgs {
            path: Some(path.to_string()),
            max_depth: Some(max_depth),
            show_files: Some(show_files),
        }
    }

    #[test]
    fn renders_dirs_before_files_with_connectors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src/components")).expect("mkdir");
        fs::create_dir_all(root.join("node_modules/react")).expect("mkdir");
        fs::write(root.join("src/components/Button.tsx"), "").expect("write");
        fs::write(root.join("src/app.ts"), "").expect("write");
        fs::write(root.join("README.md"), "").expect("write");

        let out = tree_for(root, 500).render(&args(".", 3, true)).expect("render");
        let expected = [
            "Directory: ./",
            "├── src/",
            "│   ├── components/",
            "│   │   └── Button.tsx",
            "│   └── app.ts",
            "└── README.md",
        ]
        .join("\n");
        assert_eq!(out, expected);
    }

    #[test]
    fn hides_files_when_requested() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("a/b")).expect("mkdir");
        fs::write(temp.path().join("a/file.txt"), "").expect("write");

        let out = tree_for(temp.path(), 500)
            .render(&args(".", 5, false))
            .expect("render");
        assert_eq!(out, "Directory: ./\n└── a/\n    └── b/");
    }

    #[test]
    fn depth_limits_recursion() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("a/b/c/d")).expect("mkdir");

        let out = tree_for(temp.path(), 500)
            .render(&args(".", 2, true))
            .expect("render");
        assert!(out.contains("a/"));
        assert!(out.contains("b/"));
        assert!(!out.contains("c/"));
    }

    #[test]
    fn depth_is_clamped_to_range() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("1/2/3/4/5/6/7")).expect("mkdir");

        let tree = tree_for(temp.path(), 500);
        let deep = tree.render(&args(".", 99, true)).expect("render");
        assert!(deep.contains("5/"));
        assert!(!deep.contains("6/"));

        let shallow = tree.render(&args(".", 0, true)).expect("render");
        assert!(shallow.contains("1/"));
        assert!(!shallow.contains("2/"));
    }

    #[test]
    fn overflow_truncates_and_marks_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        for idx in 0..12 {
            fs::write(temp.path().join(format!("f{idx:02}.txt")), "").expect("write");
        }

        let out = tree_for(temp.path(), 5)
            .render(&args(".", 1, true))
            .expect("render");
        let lines: Vec<&str> = out.lines().collect();
        // header + 5 entries + marker
        assert_eq!(lines.len(), 7);
        assert_eq!(
            out.matches("... (output truncated at 5 entries)").count(),
            1
        );
        assert_eq!(lines[5], "├── f04.txt");
    }

    #[test]
    fn exact_cap_is_not_marked() {
        let temp = tempfile::tempdir().expect("tempdir");
        for idx in 0..5 {
            fs::write(temp.path().join(format!("f{idx}.txt")), "").expect("write");
        }
        let out = tree_for(temp.path(), 5)
            .render(&args(".", 1, true))
            .expect("render");
        assert!(!out.contains("truncated"));
    }

    #[test]
    fn file_and_missing_paths_are_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("note.md"), "").expect("write");
        let tree = tree_for(temp.path(), 500);

        let err = tree.render(&args("note.md", 2, true)).unwrap_err();
        assert!(matches!(err, ToolError::NotADirectory { .. }));
        let err = tree.render(&args("missing", 2, true)).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
        let err = tree.render(&args("..", 2, true)).unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_degrades_to_marker() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let locked = temp.path().join("locked");
        fs::create_dir_all(&locked).expect("mkdir");
        fs::write(temp.path().join("open.txt"), "").expect("write");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");

        // Root can list anything; only assert when the permission actually applies.
        let denied = fs::read_dir(&locked).is_err();
        let out = tree_for(temp.path(), 500).render(&args(".", 3, true));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("restore");

        let out = out.expect("render");
        assert!(out.contains("open.txt"));
        if denied {
            assert!(out.contains("│   [permission denied]"));
        }
    }

    #[test]
    fn read_errors_other_than_permission_show_their_reason() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(unreadable_marker(&denied), "[permission denied]");

        let gone = io::Error::new(io::ErrorKind::NotFound, "directory vanished");
        assert_eq!(unreadable_marker(&gone), "[unreadable: directory vanished]");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_marked_and_not_entered() {
        use std::os::unix::fs::symlink;

        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).expect("mkdir");
        fs::create_dir_all(temp.path().join("outside")).expect("mkdir");
        fs::write(temp.path().join("outside/secret.txt"), "").expect("write");
        fs::write(root.join("README.md"), "").expect("write");
        symlink("../outside", root.join("linked")).expect("dir link");
        symlink("../outside", root.join("node_modules")).expect("skipped link");
        symlink("README.md", root.join("readme.link")).expect("file link");

        let out = tree_for(&root, 500).render(&args(".", 3, true)).expect("render");
        let expected = [
            "Directory: ./",
            "├── linked/ -> ../outside",
            "├── README.md",
            "└── readme.link -> README.md",
        ]
        .join("\n");
        assert_eq!(out, expected);
    }
}
