//! `schema_action`: read-only introspection of SQL migrations and TypeScript types.
//!
//! Everything here is regex matching plus the block heuristics in
//! [`crate::core::blocks`]; no SQL or TypeScript is parsed.

use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::blocks::{SQL_STATEMENT, TYPE_DEFINITION, balanced_block, line_number_at, terminated_block};
use crate::core::text::{heavy_rule, rule, truncate_bytes};
use crate::core::types::SkipSet;
use crate::error::{ToolError, ToolResult};
use crate::io::config::{LimitsConfig, TraversalConfig};
use crate::io::walk::{has_extension, read_scannable, walk_files};
use crate::io::workspace::PathResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SchemaActionKind {
    #[value(name = "list_migrations")]
    ListMigrations,
    #[value(name = "read_migration")]
    ReadMigration,
    #[value(name = "find_table")]
    FindTable,
    #[value(name = "find_rls")]
    FindRls,
    #[value(name = "analyze_types")]
    AnalyzeTypes,
}

impl SchemaActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListMigrations => "list_migrations",
            Self::ReadMigration => "read_migration",
            Self::FindTable => "find_table",
            Self::FindRls => "find_rls",
            Self::AnalyzeTypes => "analyze_types",
        }
    }
}

impl fmt::Display for SchemaActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaArgs {
    pub action: SchemaActionKind,
    /// Migration file name, table name or type name depending on the action.
    #[serde(default)]
    pub target: Option<String>,
}

/// A schema action with its target already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAction {
    ListMigrations,
    ReadMigration(String),
    FindTable(String),
    FindPolicies(String),
    AnalyzeTypes(String),
}

impl TryFrom<&SchemaArgs> for SchemaAction {
    type Error = ToolError;

    fn try_from(args: &SchemaArgs) -> ToolResult<Self> {
        let target = args.target.as_deref().map(str::trim).unwrap_or_default();
        let require = |hint: &'static str| {
            if target.is_empty() {
                Err(ToolError::MissingTarget {
                    action: args.action.as_str(),
                    hint,
                })
            } else {
                Ok(target.to_string())
            }
        };
        Ok(match args.action {
            SchemaActionKind::ListMigrations => Self::ListMigrations,
            SchemaActionKind::ReadMigration => Self::ReadMigration(require("Provide a migration file name.")?),
            SchemaActionKind::FindTable => Self::FindTable(require("Provide a table name.")?),
            SchemaActionKind::FindRls => Self::FindPolicies(require("Provide a table name.")?),
            SchemaActionKind::AnalyzeTypes => Self::AnalyzeTypes(require("Provide a type name.")?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    resolver: PathResolver,
    skip: SkipSet,
    sql_extensions: Vec<String>,
    typed_extensions: Vec<String>,
    migration_max_bytes: usize,
    type_max_matches: usize,
    scan_max_file_bytes: u64,
}

impl SchemaIntrospector {
    pub fn new(
        resolver: PathResolver,
        skip: SkipSet,
        traversal: &TraversalConfig,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            resolver,
            skip,
            sql_extensions: traversal.sql_extensions.clone(),
            typed_extensions: traversal.typed_source_extensions.clone(),
            migration_max_bytes: limits.migration_max_bytes,
            type_max_matches: limits.type_max_matches,
            scan_max_file_bytes: limits.scan_max_file_bytes,
        }
    }

    #[instrument(skip_all, fields(action = %args.action))]
    pub fn run(&self, args: &SchemaArgs) -> ToolResult<String> {
        match SchemaAction::try_from(args)? {
            SchemaAction::ListMigrations => Ok(self.list_migrations()),
            SchemaAction::ReadMigration(name) => self.read_migration(&name),
            SchemaAction::FindTable(table) => self.find_table(&table),
            SchemaAction::FindPolicies(table) => self.find_policies(&table),
            SchemaAction::AnalyzeTypes(name) => self.analyze_types(&name),
        }
    }

    fn list_migrations(&self) -> String {
        let mut files: Vec<String> = self
            .sql_files()
            .iter()
            .map(|path| self.resolver.relative(path))
            .collect();
        files.sort();

        let mut out = format!("SQL Migration Files ({} total):\n{}\n", files.len(), rule(40));
        for file in &files {
            out.push_str(&format!("  {file}\n"));
        }
        out
    }

    fn read_migration(&self, name: &str) -> ToolResult<String> {
        let files = self.sql_files();
        let chosen = files
            .iter()
            .find(|path| file_name(path) == name)
            .or_else(|| files.iter().find(|path| file_name(path).contains(name)))
            .ok_or_else(|| ToolError::NotFound {
                path: name.to_string(),
            })?;

        let rel = self.resolver.relative(chosen);
        let read_failure = |source| ToolError::ReadFailure {
            path: rel.clone(),
            source,
        };
        let total = fs::metadata(chosen).map_err(read_failure)?.len();
        // Enough bytes to finish a multi-byte char straddling the cap.
        let mut bytes = Vec::new();
        File::open(chosen)
            .and_then(|file| {
                file.take(self.migration_max_bytes as u64 + 3)
                    .read_to_end(&mut bytes)
            })
            .map_err(read_failure)?;
        let text = String::from_utf8_lossy(&bytes);
        let (kept, _) = truncate_bytes(&text, self.migration_max_bytes);
        let dropped = total.saturating_sub(kept.len() as u64);

        let mut out = format!("File: {rel}\n{}\n{kept}", heavy_rule(40));
        if dropped > 0 {
            out.push_str(&format!("\n\n... ({dropped} more bytes truncated)"));
        }
        Ok(out)
    }

    fn find_table(&self, table: &str) -> ToolResult<String> {
        let pattern = compile(&format!(
            r#"CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:public\.)?"?{}"#,
            identifier(table)
        ))?;

        let mut blocks = Vec::new();
        for path in self.sql_files() {
            let Some(content) = read_scannable(&path, self.scan_max_file_bytes) else {
                continue;
            };
            let rel = self.resolver.relative(&path);
            for found in pattern.find_iter(&content) {
                let block = terminated_block(&content, found.start(), ';', SQL_STATEMENT);
                blocks.push(format!("In {rel}:\n{block}\n"));
            }
        }

        if blocks.is_empty() {
            return Ok(format!("No CREATE TABLE found for '{table}'"));
        }
        Ok(format!(
            "Table '{table}' definitions:\n{}\n{}",
            heavy_rule(40),
            blocks.join("\n")
        ))
    }

    fn find_policies(&self, table: &str) -> ToolResult<String> {
        let ident = identifier(table);
        let pattern = compile(&format!(
            r#"(?:CREATE\s+POLICY\s+(?:"[^"]*"|\S+)\s+ON\s+(?:public\.)?"?{ident}|ALTER\s+TABLE\s+(?:ONLY\s+)?(?:public\.)?"?{ident}"?\s+(?:ENABLE|FORCE)\s+ROW\s+LEVEL\s+SECURITY)"#
        ))?;

        let mut blocks = Vec::new();
        for path in self.sql_files() {
            let Some(content) = read_scannable(&path, self.scan_max_file_bytes) else {
                continue;
            };
            let rel = self.resolver.relative(&path);
            for found in pattern.find_iter(&content) {
                let line = line_number_at(&content, found.start());
                let block = terminated_block(&content, found.start(), ';', SQL_STATEMENT);
                blocks.push(format!("In {rel}:{line}:\n{block}\n"));
            }
        }

        if blocks.is_empty() {
            return Ok(format!("No RLS policies found for '{table}'"));
        }
        Ok(format!(
            "RLS policies for '{table}':\n{}\n{}",
            heavy_rule(40),
            blocks.join("\n")
        ))
    }

    fn analyze_types(&self, name: &str) -> ToolResult<String> {
        let pattern = compile(&format!(
            r"(?:export\s+)?(?:type|interface)\s+{}",
            identifier(name)
        ))?;

        let mut blocks = Vec::new();
        walk_files(self.resolver.root(), &self.skip, |path| {
            if !has_extension(path, &self.typed_extensions) {
                return ControlFlow::Continue(());
            }
            let Some(content) = read_scannable(path, self.scan_max_file_bytes) else {
                return ControlFlow::Continue(());
            };
            let rel = self.resolver.relative(path);
            for found in pattern.find_iter(&content) {
                let block = balanced_block(&content, found.start(), TYPE_DEFINITION);
                blocks.push(format!("In {rel}:\n{block}\n"));
                if blocks.len() >= self.type_max_matches {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });

        if blocks.is_empty() {
            return Ok(format!("No TypeScript type/interface found for '{name}'"));
        }
        Ok(format!(
            "TypeScript definitions for '{name}':\n{}\n{}",
            heavy_rule(40),
            blocks.join("\n")
        ))
    }

    /// SQL files under the workspace in traversal order.
    fn sql_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        walk_files(self.resolver.root(), &self.skip, |path| {
            if has_extension(path, &self.sql_extensions) {
                files.push(path.to_path_buf());
            }
            ControlFlow::Continue(())
        });
        files
    }
}

/// Escaped identifier; a trailing word boundary keeps `kids` from matching `kids_archive`.
fn identifier(name: &str) -> String {
    let escaped = regex::escape(name);
    if name.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_') {
        format!(r"{escaped}\b")
    } else {
        escaped
    }
}

fn compile(pattern: &str) -> ToolResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ToolError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT_SQL: &str = "\
-- initial schema
CREATE TABLE IF NOT EXISTS public.kids (
  id uuid primary key,
  name text not null
);

CREATE TABLE kids_archive (id uuid);

ALTER TABLE public.kids ENABLE ROW LEVEL SECURITY;

CREATE POLICY \"Parents read kids\" ON public.kids
  FOR SELECT USING (auth.uid() = parent_id);
";

    const TYPES_TS: &str = "\
import { z } from 'zod';

export interface Kid {
  id: string;
  meta: { tags: string[] };
}

export type KidId = string;
";

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("supabase/migrations")).expect("mkdir");
        fs::create_dir_all(root.join("src/types")).expect("mkdir");
        fs::create_dir_all(root.join("node_modules/pkg")).expect("mkdir");
        fs::write(root.join("supabase/migrations/001_init.sql"), INIT_SQL).expect("write");
        fs::write(
            root.join("supabase/migrations/002_leads.sql"),
            "create table leads (id int);\n",
        )
        .expect("write");
        fs::write(root.join("node_modules/pkg/hidden.sql"), "CREATE TABLE kids ();").expect("write");
        fs::write(root.join("src/types/kid.ts"), TYPES_TS).expect("write");
    }

    fn introspector(root: &Path) -> SchemaIntrospector {
        SchemaIntrospector::new(
            PathResolver::new(root).expect("resolver"),
            SkipSet::new(["node_modules", ".git"]),
            &TraversalConfig::default(),
            &LimitsConfig::default(),
        )
    }

    fn args(action: SchemaActionKind, target: Option<&str>) -> SchemaArgs {
        SchemaArgs {
            action,
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn targets_are_required_except_for_listing() {
        for action in [
            SchemaActionKind::ReadMigration,
            SchemaActionKind::FindTable,
            SchemaActionKind::FindRls,
            SchemaActionKind::AnalyzeTypes,
        ] {
            let err = SchemaAction::try_from(&args(action, Some("  "))).unwrap_err();
            assert!(matches!(err, ToolError::MissingTarget { .. }), "{action}");
        }
        assert_eq!(
            SchemaAction::try_from(&args(SchemaActionKind::ListMigrations, None)).expect("list"),
            SchemaAction::ListMigrations
        );
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        let parsed: Result<SchemaArgs, _> =
            serde_json::from_str(r#"{"action":"drop_everything","target":"kids"}"#);
        assert!(parsed.is_err());
        let parsed: SchemaArgs =
            serde_json::from_str(r#"{"action":"find_rls","target":"kids"}"#).expect("parse");
        assert_eq!(parsed.action, SchemaActionKind::FindRls);
    }

    #[test]
    fn lists_sql_files_sorted() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::ListMigrations, None))
            .expect("list");
        assert_eq!(
            out,
            format!(
                "SQL Migration Files (2 total):\n{}\n  supabase/migrations/001_init.sql\n  supabase/migrations/002_leads.sql\n",
                rule(40)
            )
        );
    }

    #[test]
    fn read_migration_prefers_exact_then_substring() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let schema = introspector(temp.path());

        let out = schema
            .run(&args(SchemaActionKind::ReadMigration, Some("leads")))
            .expect("read");
        assert!(out.starts_with("File: supabase/migrations/002_leads.sql\n========"));
        assert!(out.ends_with("create table leads (id int);\n"));

        let err = schema
            .run(&args(SchemaActionKind::ReadMigration, Some("999_missing")))
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn read_migration_caps_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("big.sql"), "x".repeat(6_000)).expect("write");
        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::ReadMigration, Some("big.sql")))
            .expect("read");
        assert!(out.ends_with("... (1000 more bytes truncated)"));
    }

    #[test]
    fn oversized_migrations_are_listed_but_not_scanned() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dump = format!("CREATE TABLE dumped (id int);\n{}", "-- filler\n".repeat(64));
        fs::write(temp.path().join("dump.sql"), &dump).expect("write");
        let limits = LimitsConfig {
            scan_max_file_bytes: 256,
            ..LimitsConfig::default()
        };
        let schema = SchemaIntrospector::new(
            PathResolver::new(temp.path()).expect("resolver"),
            SkipSet::new(["node_modules"]),
            &TraversalConfig::default(),
            &limits,
        );

        let listed = schema
            .run(&args(SchemaActionKind::ListMigrations, None))
            .expect("list");
        assert!(listed.contains("  dump.sql"));
        let found = schema
            .run(&args(SchemaActionKind::FindTable, Some("dumped")))
            .expect("find");
        assert_eq!(found, "No CREATE TABLE found for 'dumped'");
        let read = schema
            .run(&args(SchemaActionKind::ReadMigration, Some("dump.sql")))
            .expect("read");
        assert!(read.contains("CREATE TABLE dumped"));
    }

    #[test]
    fn find_table_extracts_statement_and_respects_word_boundary() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::FindTable, Some("kids")))
            .expect("find");
        assert!(out.starts_with("Table 'kids' definitions:\n"));
        assert!(out.contains(
            "In supabase/migrations/001_init.sql:\nCREATE TABLE IF NOT EXISTS public.kids (\n  id uuid primary key,\n  name text not null\n);\n"
        ));
        assert!(!out.contains("kids_archive"));
        assert!(!out.contains("hidden.sql"));
    }

    #[test]
    fn find_table_is_case_insensitive() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::FindTable, Some("LEADS")))
            .expect("find");
        assert!(out.contains("create table leads (id int);"));

        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::FindTable, Some("parents")))
            .expect("find");
        assert_eq!(out, "No CREATE TABLE found for 'parents'");
    }

    #[test]
    fn find_rls_reports_lines_and_blocks() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::FindRls, Some("kids")))
            .expect("rls");
        assert!(out.starts_with("RLS policies for 'kids':\n"));
        assert!(out.contains(
            "In supabase/migrations/001_init.sql:9:\nALTER TABLE public.kids ENABLE ROW LEVEL SECURITY;\n"
        ));
        assert!(out.contains(
            "In supabase/migrations/001_init.sql:11:\nCREATE POLICY \"Parents read kids\" ON public.kids\n  FOR SELECT USING (auth.uid() = parent_id);\n"
        ));

        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::FindRls, Some("leads")))
            .expect("rls");
        assert_eq!(out, "No RLS policies found for 'leads'");
    }

    #[test]
    fn analyze_types_extracts_balanced_blocks() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let schema = introspector(temp.path());

        let out = schema
            .run(&args(SchemaActionKind::AnalyzeTypes, Some("Kid")))
            .expect("types");
        assert_eq!(
            out,
            format!(
                "TypeScript definitions for 'Kid':\n{}\nIn src/types/kid.ts:\nexport interface Kid {{\n  id: string;\n  meta: {{ tags: string[] }};\n}}\n",
                heavy_rule(40)
            )
        );

        let out = schema
            .run(&args(SchemaActionKind::AnalyzeTypes, Some("KidId")))
            .expect("types");
        assert!(out.contains("In src/types/kid.ts:\nexport type KidId = string;\n"));
    }

    #[test]
    fn analyze_types_caps_matches() {
        let temp = tempfile::tempdir().expect("tempdir");
        let body: String = (0..5)
            .map(|idx| format!("// copy {idx}\ninterface Row {{ id: number }}\n"))
            .collect();
        fs::write(temp.path().join("rows.ts"), body).expect("write");

        let out = introspector(temp.path())
            .run(&args(SchemaActionKind::AnalyzeTypes, Some("Row")))
            .expect("types");
        assert_eq!(out.matches("In rows.ts:").count(), 3);
    }

    #[test]
    fn identifier_boundary_only_after_word_chars() {
        assert_eq!(identifier("kids"), r"kids\b");
        assert_eq!(identifier("a.b"), r"a\.b\b");
        assert_eq!(identifier("kids("), r"kids\(");
    }
}
