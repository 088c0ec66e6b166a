//! Tool schemas, dispatch, and response rendering.
//!
//! Every tool accepts a `response_format` of `markdown` (default) or
//! `json`. Failures produce a structured envelope with a stable code
//! (`NOT_FOUND`, `INVALID_INPUT`, `PARSE_FAILED`, `IO_ERROR`, `INTERNAL`)
//! inside an `isError` tool result; tools never panic and never return an
//! empty success for a missing target.

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

use super::{McpServer, ToolResult};
use crate::analysis::{
    self, DependencyReport, Direction, ImpactReport, ReferenceReport, SummaryPage, TraceGroup,
};
use crate::errors::{ErrorCode, ErrorEnvelope, QueryError};
use crate::graph::Node;
use crate::validation::normalize_path;

// ── Parameters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Markdown,
    Json,
}

fn default_limit() -> usize {
    100
}

fn default_depth() -> usize {
    1
}

fn default_direction() -> String {
    "both".to_string()
}

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
struct StructuralSummaryParams {
    file_path: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct CallStackParams {
    node_name: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default = "default_direction")]
    direction: String,
    #[serde(default = "default_depth")]
    depth: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct FilePathParams {
    file_path: String,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ReferencesParams {
    symbol_name: String,
    #[serde(default)]
    scope_path: Option<String>,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    pattern: String,
    #[serde(default)]
    scope_path: Option<String>,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ReindexParams {
    #[serde(default = "default_path")]
    path: String,
}

// ── Definitions ─────────────────────────────────────────────────────────

/// Tool metadata for `tools/list`.
pub fn tool_definitions() -> Vec<Value> {
    let response_format = json!({
        "type": "string",
        "enum": ["markdown", "json"],
        "description": "Output format (default: markdown)"
    });

    vec![
        json!({
            "name": "vibegraph_get_structural_summary",
            "description": "Get a concise structural summary of a file (classes, functions, methods) with pagination.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "Path to the file to analyze (e.g. 'src/parser.py')"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 500, "description": "Maximum nodes to return (default: 100)"},
                    "offset": {"type": "integer", "minimum": 0, "description": "Nodes to skip for pagination (default: 0)"},
                    "response_format": response_format
                },
                "required": ["file_path"]
            }
        }),
        json!({
            "name": "vibegraph_get_call_stack",
            "description": "Trace function calls up (callers), down (callees), or both, with bounded depth and cycle markers.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "node_name": {"type": "string", "description": "Name of the function or class to trace"},
                    "file_path": {"type": "string", "description": "Optional file path to disambiguate same-named nodes"},
                    "direction": {"type": "string", "enum": ["up", "down", "both"], "description": "Trace direction (default: both)"},
                    "depth": {"type": "integer", "minimum": 1, "maximum": 10, "description": "Maximum traversal depth (default: 1)"},
                    "response_format": response_format
                },
                "required": ["node_name"]
            }
        }),
        json!({
            "name": "vibegraph_impact_analysis",
            "description": "List what depends on a file, transitively up to 3 levels, grouped by file.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "Path to the file to analyze for impact"},
                    "response_format": response_format
                },
                "required": ["file_path"]
            }
        }),
        json!({
            "name": "vibegraph_get_dependencies",
            "description": "List modules imported by a file, categorised as internal, standard library, or third party.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "Path to the file to check for outgoing dependencies"},
                    "response_format": response_format
                },
                "required": ["file_path"]
            }
        }),
        json!({
            "name": "vibegraph_find_references",
            "description": "Find where a symbol is called or referenced, grouped by referencing file.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "symbol_name": {"type": "string", "description": "Name of the function/class/variable to find references for"},
                    "scope_path": {"type": "string", "description": "Optional file or directory prefix to scope the search"},
                    "response_format": response_format
                },
                "required": ["symbol_name"]
            }
        }),
        json!({
            "name": "vibegraph_search_by_signature",
            "description": "Search node signatures with % wildcards, ranked exact > prefix > contains.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pattern": {"type": "string", "description": "Pattern with % wildcards (e.g. '%Node%')"},
                    "scope_path": {"type": "string", "description": "Optional file-path prefix to scope the search"},
                    "response_format": response_format
                },
                "required": ["pattern"]
            }
        }),
        json!({
            "name": "vibegraph_reindex_project",
            "description": "Reindex a file or directory recursively, respecting ignore rules. The only tool that mutates the store.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to index, '.' for the project root (default: '.')"}
                }
            }
        }),
    ]
}

// ── Dispatch ────────────────────────────────────────────────────────────

/// Run one tool call against the server state.
pub fn dispatch(server: &McpServer, tool: &str, args: Value) -> ToolResult {
    match tool {
        "vibegraph_get_structural_summary" => structural_summary(server, args),
        "vibegraph_get_call_stack" => call_stack(server, args),
        "vibegraph_impact_analysis" => impact_analysis(server, args),
        "vibegraph_get_dependencies" => dependencies(server, args),
        "vibegraph_find_references" => find_references(server, args),
        "vibegraph_search_by_signature" => search_by_signature(server, args),
        "vibegraph_reindex_project" => reindex_project(server, args),
        other => error_result(
            ErrorCode::InvalidInput,
            format!("unknown tool: {other}"),
        ),
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolResult> {
    serde_json::from_value(args)
        .map_err(|e| error_result(ErrorCode::InvalidInput, format!("invalid arguments: {e}")))
}

fn error_result(code: ErrorCode, message: impl Into<String>) -> ToolResult {
    let envelope = ErrorEnvelope::new(code, message);
    let text = serde_json::to_string(&envelope)
        .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", envelope.code));
    ToolResult::tool_error(text)
}

fn query_error_result(err: QueryError) -> ToolResult {
    let envelope = ErrorEnvelope::from(&err);
    let text = serde_json::to_string(&envelope)
        .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", envelope.code));
    ToolResult::tool_error(text)
}

fn rel_path(server: &McpServer, input: &str) -> String {
    normalize_path(Path::new(input), server.root())
}

fn render<T: serde::Serialize>(
    format: ResponseFormat,
    report: &T,
    markdown: impl FnOnce(&T) -> String,
) -> ToolResult {
    match format {
        ResponseFormat::Markdown => ToolResult::text(markdown(report)),
        ResponseFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => ToolResult::text(json),
            Err(e) => error_result(ErrorCode::Internal, format!("serialize failed: {e}")),
        },
    }
}

// ── Tool implementations ────────────────────────────────────────────────

fn structural_summary(server: &McpServer, args: Value) -> ToolResult {
    let params: StructuralSummaryParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };
    let path = rel_path(server, &params.file_path);
    match analysis::structural_summary(server.store(), &path, params.limit, params.offset) {
        Ok(page) => render(params.response_format, &page, summary_markdown),
        Err(err) => query_error_result(err),
    }
}

fn call_stack(server: &McpServer, args: Value) -> ToolResult {
    let params: CallStackParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };
    let direction = match Direction::parse(&params.direction) {
        Ok(direction) => direction,
        Err(err) => return query_error_result(err),
    };
    let scoped_path = params.file_path.as_ref().map(|p| rel_path(server, p));
    match analysis::call_stack(
        server.store(),
        &params.node_name,
        scoped_path.as_deref(),
        direction,
        params.depth,
    ) {
        Ok(groups) => render(params.response_format, &groups, trace_markdown),
        Err(err) => query_error_result(err),
    }
}

fn impact_analysis(server: &McpServer, args: Value) -> ToolResult {
    let params: FilePathParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };
    let path = rel_path(server, &params.file_path);
    match analysis::impact_analysis(server.store(), &path) {
        Ok(report) => render(params.response_format, &report, impact_markdown),
        Err(err) => query_error_result(err),
    }
}

fn dependencies(server: &McpServer, args: Value) -> ToolResult {
    let params: FilePathParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };
    let path = rel_path(server, &params.file_path);
    match analysis::dependencies(server.store(), &path) {
        Ok(report) => render(params.response_format, &report, dependencies_markdown),
        Err(err) => query_error_result(err),
    }
}

fn find_references(server: &McpServer, args: Value) -> ToolResult {
    let params: ReferencesParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };
    let scope = params
        .scope_path
        .as_ref()
        .filter(|s| *s != ".")
        .map(|s| rel_path(server, s));
    match analysis::find_references(server.store(), &params.symbol_name, scope.as_deref()) {
        Ok(report) => render(params.response_format, &report, references_markdown),
        Err(err) => query_error_result(err),
    }
}

fn search_by_signature(server: &McpServer, args: Value) -> ToolResult {
    let params: SearchParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };
    let scope = params
        .scope_path
        .as_ref()
        .filter(|s| *s != ".")
        .map(|s| rel_path(server, s));
    match analysis::search_by_signature(server.store(), &params.pattern, scope.as_deref()) {
        Ok(hits) => {
            let pattern = params.pattern.clone();
            render(params.response_format, &hits, |hits| {
                search_markdown(&pattern, hits)
            })
        }
        Err(err) => query_error_result(err),
    }
}

fn reindex_project(server: &McpServer, args: Value) -> ToolResult {
    let params: ReindexParams = match parse_args(args) {
        Ok(params) => params,
        Err(err) => return err,
    };

    let mut indexer = match server.lock_indexer() {
        Ok(indexer) => indexer,
        Err(e) => return error_result(ErrorCode::Internal, e.to_string()),
    };

    let report = if params.path == "." {
        indexer.reindex_all()
    } else {
        indexer.reindex_path(Path::new(&params.path))
    };

    match report {
        Ok(report) => ToolResult::text(format!(
            "Reindexed {}: {} files, {} nodes, {} edges ({} diagnostics)",
            params.path,
            report.files_indexed,
            report.nodes,
            report.edges,
            report.diagnostics.len()
        )),
        Err(e) => error_result(ErrorCode::IoError, e.to_string()),
    }
}

// ── Markdown rendering ──────────────────────────────────────────────────

fn summary_markdown(page: &SummaryPage) -> String {
    let end = page.offset + page.count;
    let mut out = vec![format!(
        "Structure for `{}` (showing {}-{} of {} nodes):\n",
        page.file_path,
        page.offset + 1,
        end,
        page.total
    )];

    for node in &page.nodes {
        let mut line = format!("- [{}] **{}**", node.kind, node.name);
        match node.visibility {
            crate::graph::Visibility::Public => {}
            other => line.push_str(&format!(" [{other}]")),
        }
        if !node.signature.is_empty() {
            line.push_str(&format!(" `{}`", node.signature));
        }
        line.push_str(&format!(" (L{}-{})", node.start_line, node.end_line));
        for decorator in &node.decorators {
            line.push_str(&format!("\n  {decorator}"));
        }
        out.push(line);
    }

    if let Some(next) = page.next_offset {
        out.push(format!(
            "\n... {} more nodes available (use offset={} to see more)",
            page.total - end,
            next
        ));
    }
    out.join("\n")
}

fn trace_markdown(groups: &Vec<TraceGroup>) -> String {
    let mut out = Vec::new();
    for group in groups {
        out.push(format!(
            "### Trace for `{}` ({}) in `{}`",
            group.origin.name, group.origin.kind, group.origin.file_path
        ));

        out.push("\n**Callers (Incoming):**".to_string());
        if group.callers.is_empty() {
            out.push("  (no callers found)".to_string());
        }
        for entry in &group.callers {
            let indent = "  ".repeat(entry.depth - 1);
            if entry.cycle {
                out.push(format!(
                    "{indent}- [CYCLE DETECTED - circular dependency] `{}`",
                    entry.breadcrumb
                ));
            } else {
                out.push(format!(
                    "{indent}- <- called by `{}` in `{}`",
                    entry.breadcrumb, entry.file_path
                ));
            }
        }

        out.push("\n**Callees (Outgoing):**".to_string());
        if group.callees.is_empty() {
            out.push("  (no callees found)".to_string());
        }
        for entry in &group.callees {
            let indent = "  ".repeat(entry.depth - 1);
            if entry.cycle {
                out.push(format!(
                    "{indent}- [CYCLE DETECTED - circular dependency] `{}`",
                    entry.breadcrumb
                ));
            } else {
                out.push(format!(
                    "{indent}- -> calls `{}` in `{}`",
                    entry.breadcrumb, entry.file_path
                ));
            }
        }
        out.push(String::new());
    }
    out.join("\n")
}

fn impact_markdown(report: &ImpactReport) -> String {
    let mut out = vec![format!("## Impact Analysis for `{}`", report.file_path)];

    if report.total == 0 {
        out.push("No external dependents found. Safe to refactor internally.".to_string());
        return out.join("\n");
    }

    out.push(format!(
        "**Total Impact**: {} components affected up to {} levels.\n",
        report.total,
        analysis::IMPACT_MAX_LEVELS
    ));

    let titles = ["Direct Impact", "Secondary Impact (Ripple Effect)", "Deep Impact"];
    for level in &report.levels {
        if level.groups.is_empty() {
            continue;
        }
        let title = titles.get(level.level - 1).unwrap_or(&"Impact");
        out.push(format!("### Level {}: {}", level.level, title));
        for (file, entries) in &level.groups {
            for entry in entries {
                out.push(format!(
                    "- **`{}`** (`{}`) depends on `{}`",
                    entry.name, file, entry.via
                ));
            }
        }
        out.push(String::new());
    }
    out.join("\n")
}

fn references_markdown(report: &ReferenceReport) -> String {
    let mut out = vec![format!("## References to `{}`", report.symbol)];
    if report.total == 0 {
        out.push("No references found.".to_string());
        return out.join("\n");
    }
    for (file, entries) in &report.groups {
        out.push(format!("\n### In `{file}`"));
        for entry in entries {
            let line = entry
                .site_line
                .map(|l| format!(", L{l}"))
                .unwrap_or_default();
            out.push(format!(
                "- `{}` ({}{}) -> `{}` in `{}`",
                entry.from_name, entry.relation, line, report.symbol, entry.target_file
            ));
        }
    }
    out.join("\n")
}

fn search_markdown(pattern: &str, hits: &Vec<Node>) -> String {
    let mut out = vec![format!("## Signature Search: `{pattern}`")];
    if hits.is_empty() {
        out.push("No matches found.".to_string());
        return out.join("\n");
    }
    for node in hits {
        out.push(format!(
            "- **`{}`**: `{}`\n  - In `{}`:L{}",
            node.name, node.signature, node.file_path, node.start_line
        ));
    }
    out.join("\n")
}

fn dependencies_markdown(report: &DependencyReport) -> String {
    let mut out = vec![format!("## Dependencies for `{}`", report.file_path)];

    if !report.internal.is_empty() {
        out.push("\n### Internal Project Modules".to_string());
        for dep in &report.internal {
            let path = dep.file_path.as_deref().unwrap_or("?");
            out.push(format!("- **{}** (`{}`)", dep.name, path));
        }
    }
    if !report.third_party.is_empty() {
        out.push("\n### Third-Party Packages".to_string());
        for dep in &report.third_party {
            out.push(format!("- **{}**", dep.name));
        }
    }
    if !report.std_lib.is_empty() {
        out.push("\n### Standard Library".to_string());
        for dep in &report.std_lib {
            out.push(format!("- {}", dep.name));
        }
    }
    if report.internal.is_empty() && report.third_party.is_empty() && report.std_lib.is_empty() {
        out.push("No explicit imports found in index.".to_string());
    }
    out.join("\n")
}
