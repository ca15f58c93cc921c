//! `search_code`: case-insensitive regex search with a global result cap.

use std::ops::ControlFlow;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::text::rule;
use crate::core::types::{SearchHit, SkipSet};
use crate::error::{ToolError, ToolResult};
use crate::io::config::{LimitsConfig, TraversalConfig};
use crate::io::walk::{extension_of, has_extension, read_scannable, walk_files};
use crate::io::workspace::PathResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCodeArgs {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Exact extension filter, e.g. `.tsx` or `tsx`.
    #[serde(default)]
    pub file_extension: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Raw search outcome before rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReport {
    pub files_scanned: usize,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone)]
pub struct CodeSearch {
    resolver: PathResolver,
    skip: SkipSet,
    text_extensions: Vec<String>,
    default_path: String,
    default_max_results: usize,
    max_results_ceiling: usize,
    max_file_bytes: u64,
}

impl CodeSearch {
    pub fn new(
        resolver: PathResolver,
        skip: SkipSet,
        traversal: &TraversalConfig,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            resolver,
            skip,
            text_extensions: traversal.text_extensions.clone(),
            default_path: limits.search_default_path.clone(),
            default_max_results: limits.search_default_max_results,
            max_results_ceiling: limits.search_max_results,
            max_file_bytes: limits.scan_max_file_bytes,
        }
    }

    #[instrument(skip_all, fields(pattern = %args.pattern))]
    pub fn search(&self, args: &SearchCodeArgs) -> ToolResult<String> {
        let shown_path = args
            .path
            .as_deref()
            .unwrap_or(&self.default_path)
            .trim_end_matches('/')
            .to_string();
        let report = self.find(args)?;

        let mut out = format!(
            "Search: '{}' in {shown_path}/ ({} files searched)\nResults: {} matches\n{}\n",
            args.pattern,
            report.files_scanned,
            report.hits.len(),
            rule(60)
        );
        if report.hits.is_empty() {
            out.push_str("No matches found.");
        } else {
            let rows: Vec<String> = report.hits.iter().map(ToString::to_string).collect();
            out.push_str(&rows.join("\n"));
        }
        Ok(out)
    }

    /// Run the search and return structured hits.
    pub fn find(&self, args: &SearchCodeArgs) -> ToolResult<SearchReport> {
        let raw = args.path.as_deref().unwrap_or(&self.default_path);
        let root = self.resolver.resolve(raw)?;
        let regex = compile(&args.pattern)?;
        if !root.exists() {
            return Err(ToolError::NotFound {
                path: raw.to_string(),
            });
        }

        let filter = normalize_extension(args.file_extension.as_deref());
        let max_results = args
            .max_results
            .unwrap_or(self.default_max_results)
            .clamp(1, self.max_results_ceiling);

        // An explicit file is scanned whatever its extension.
        let single_file = root.is_file();
        let mut report = SearchReport::default();
        walk_files(&root, &self.skip, |path| {
            if !single_file && !self.wants(path, filter.as_deref()) {
                return ControlFlow::Continue(());
            }
            self.scan_file(path, &regex, max_results, &mut report);
            if report.hits.len() >= max_results {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        debug!(
            files_scanned = report.files_scanned,
            hits = report.hits.len(),
            "search finished"
        );
        Ok(report)
    }

    fn wants(&self, path: &Path, filter: Option<&str>) -> bool {
        match filter {
            Some(filter) => extension_of(path).is_some_and(|ext| ext == filter),
            None => has_extension(path, &self.text_extensions),
        }
    }

    fn scan_file(&self, path: &Path, regex: &Regex, max_results: usize, report: &mut SearchReport) {
        let Some(text) = read_scannable(path, self.max_file_bytes) else {
            return;
        };
        report.files_scanned += 1;
        let rel = self.resolver.relative(path);
        for (idx, line) in text.lines().enumerate() {
            if regex.is_match(line) {
                report.hits.push(SearchHit {
                    path: rel.clone(),
                    line: idx + 1,
                    text: line.trim_end().to_string(),
                });
                if report.hits.len() >= max_results {
                    return;
                }
            }
        }
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

/// `.TSX`, `tsx` and ` .tsx ` all become `tsx`; empty means no filter.
fn normalize_extension(filter: Option<&str>) -> Option<String> {
    let filter = filter?.trim().trim_start_matches('.');
    if filter.is_empty() {
        None
    } else {
        Some(filter.to_lowercase())
    }
}
