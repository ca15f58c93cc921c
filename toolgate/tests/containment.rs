//! Every filesystem tool refuses paths that resolve outside the workspace.
//!
//! The workspace lives in a subdirectory of a temp dir so that escapes have a
//! real sibling to land in, and each case checks that nothing was created there.

use std::fs;

use toolgate::test_support::TestWorkspace;
use toolgate::tools::list_directory::ListDirectoryArgs;
use toolgate::tools::read_file::ReadFileArgs;
use toolgate::tools::schema::{SchemaActionKind, SchemaArgs};
use toolgate::tools::search_code::SearchCodeArgs;
use toolgate::tools::write_file::WriteFileArgs;
use toolgate::tools::{ToolCall, Toolbox};
use toolgate::io::config::ToolgateConfig;

fn calls_for(path: &str) -> Vec<ToolCall> {
    vec![
        ToolCall::ReadFile(ReadFileArgs {
            path: path.to_string(),
            max_lines: None,
        }),
        ToolCall::WriteFile(WriteFileArgs {
            path: format!("{path}/planted.txt"),
            content: "x".to_string(),
            create_backup: None,
        }),
        ToolCall::ListDirectory(ListDirectoryArgs {
            path: Some(path.to_string()),
            max_depth: None,
            show_files: None,
        }),
        ToolCall::SearchCode(SearchCodeArgs {
            pattern: "secret".to_string(),
            path: Some(path.to_string()),
            file_extension: None,
            max_results: None,
        }),
    ]
}

#[test]
fn escapes_are_denied_for_every_filesystem_tool() {
    let outer = TestWorkspace::new();
    outer.write("outside/secret.txt", "secret\n");
    let root = outer.path("ws");
    fs::create_dir_all(&root).expect("mkdir");
    let toolbox = Toolbox::new(&root, &ToolgateConfig::default()).expect("toolbox");

    let absolute = outer.path("outside").display().to_string();
    for raw in ["../outside", absolute.as_str(), "src/../../outside"] {
        for call in calls_for(raw) {
            let output = toolbox.invoke(&call);
            assert!(output.is_error, "{} with {raw} should fail", call.name());
            assert_eq!(
                output.error_kind,
                Some("access_denied"),
                "{} with {raw}: {}",
                call.name(),
                output.text
            );
        }
    }
    assert!(!outer.path("outside/planted.txt").exists());
    assert!(!root.join("src").exists());
}

#[cfg(unix)]
#[test]
fn symlinks_pointing_out_are_denied() {
    let outer = TestWorkspace::new();
    outer.write("outside/secret.txt", "secret\n");
    let root = outer.path("ws");
    fs::create_dir_all(&root).expect("mkdir");
    std::os::unix::fs::symlink(outer.path("outside"), root.join("link")).expect("symlink");
    let toolbox = Toolbox::new(&root, &ToolgateConfig::default()).expect("toolbox");

    for call in calls_for("link") {
        let output = toolbox.invoke(&call);
        assert_eq!(output.error_kind, Some("access_denied"), "{}", call.name());
    }
    let output = toolbox.invoke(&ToolCall::ReadFile(ReadFileArgs {
        path: "link/secret.txt".to_string(),
        max_lines: None,
    }));
    assert_eq!(output.error_kind, Some("access_denied"));
    assert!(!outer.path("outside/planted.txt").exists());
}

#[cfg(unix)]
#[test]
fn traversals_do_not_follow_links_out() {
    let outer = TestWorkspace::new();
    outer.write("outside/leak.sql", "CREATE TABLE leaked (id int);\n");
    outer.write("ws/src/app.ts", "// secret marker\n");
    let root = outer.path("ws");
    std::os::unix::fs::symlink(outer.path("outside"), root.join("src/linked")).expect("symlink");
    let toolbox = Toolbox::new(&root, &ToolgateConfig::default()).expect("toolbox");

    let search = toolbox.invoke(&ToolCall::SearchCode(SearchCodeArgs {
        pattern: ".".to_string(),
        path: None,
        file_extension: Some("sql".to_string()),
        max_results: None,
    }));
    assert!(search.text.contains("No matches found."), "{}", search.text);

    let tables = toolbox.invoke(&ToolCall::SchemaAction(SchemaArgs {
        action: SchemaActionKind::FindTable,
        target: Some("leaked".to_string()),
    }));
    assert_eq!(tables.text, "No CREATE TABLE found for 'leaked'");
}

#[test]
fn resolving_inside_the_root_still_works() {
    let ws = TestWorkspace::new();
    ws.write("src/app.ts", "const secret = 1;\n");
    let toolbox = ws.toolbox();

    let output = toolbox.invoke(&ToolCall::ReadFile(ReadFileArgs {
        path: "src/../src/app.ts".to_string(),
        max_lines: None,
    }));
    assert!(!output.is_error, "{}", output.text);

    let absolute = ws.path("src/app.ts").display().to_string();
    let output = toolbox.invoke(&ToolCall::ReadFile(ReadFileArgs {
        path: absolute,
        max_lines: None,
    }));
    assert!(!output.is_error, "{}", output.text);
}
